//! Meshlink CLI
//!
//! Thin wrapper around meshlink-core for command-line usage.
//!
//! ## Usage
//!
//! ```bash
//! # Show node information
//! meshlink info
//!
//! # Pick presets and a node name
//! meshlink setup --name "basecamp" --hardware "Simulated" --region "EU/UK (Narrow)"
//!
//! # Join or leave channels
//! meshlink channel join ops --secret 00112233445566778899aabbccddeeff
//! meshlink channel leave ops
//! meshlink channel list
//!
//! # Manage contacts
//! meshlink contact add <pubkey-hex> alice
//! meshlink contact list
//!
//! # Send messages (one-shot session)
//! meshlink send Public "hello mesh"
//! meshlink dm alice "hello"
//!
//! # Announce this node
//! meshlink advert
//!
//! # Run a session and stream events
//! meshlink serve
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

use meshlink_core::{
    derive_channel_secret, ChannelDef, ConfigStore, InboundEvent, MeshService, Storage,
};

/// Meshlink - LoRa mesh chat sessions
#[derive(Parser)]
#[command(name = "meshlink")]
#[command(version = "0.1.0")]
#[command(about = "Meshlink - LoRa mesh chat sessions")]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Data directory (default: ~/.meshlink)
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show node information
    Info,

    /// Write node name and presets into the configuration
    Setup {
        /// Node display name, announced in adverts
        #[arg(long)]
        name: Option<String>,

        /// Hardware preset name (see `meshlink info` for the list)
        #[arg(long)]
        hardware: Option<String>,

        /// Regional preset name
        #[arg(long)]
        region: Option<String>,
    },

    /// Channel management
    Channel {
        #[command(subcommand)]
        action: ChannelAction,
    },

    /// Contact management
    Contact {
        #[command(subcommand)]
        action: ContactAction,
    },

    /// Send a message to a channel
    Send {
        /// Channel name
        channel: String,
        /// Message text
        text: String,
    },

    /// Send a direct message to a contact
    Dm {
        /// Contact display name
        contact: String,
        /// Message text
        text: String,
    },

    /// Broadcast a self-advertisement announcing this node
    Advert,

    /// Run a mesh session and stream events until Ctrl+C
    Serve,
}

#[derive(Subcommand)]
enum ChannelAction {
    /// Join a channel
    Join {
        /// Channel name
        name: String,
        /// Explicit secret (32 hex chars); derived from the name if omitted
        #[arg(short, long)]
        secret: Option<String>,
    },
    /// Leave a channel
    Leave {
        /// Channel name
        name: String,
    },
    /// List joined channels
    List,
}

#[derive(Subcommand)]
enum ContactAction {
    /// Add or rename a contact
    Add {
        /// Public key as hex
        public_key: String,
        /// Display name
        name: String,
    },
    /// List known contacts
    List,
}

fn setup_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();
}

/// Get the default data directory (~/.meshlink)
fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".meshlink")
}

struct Node {
    config: Arc<ConfigStore>,
    storage: Arc<Storage>,
    identity_path: PathBuf,
}

impl Node {
    fn open(data_dir: &PathBuf) -> Result<Self> {
        let config = Arc::new(ConfigStore::new(data_dir.join("config.json")));
        config.load()?;
        let storage = Arc::new(Storage::new(data_dir.join("meshlink.redb"))?);
        Ok(Self {
            config,
            storage,
            identity_path: data_dir.join("identity.key"),
        })
    }

    fn service(&self) -> Result<MeshService> {
        Ok(MeshService::new(
            self.config.clone(),
            self.storage.clone(),
            &self.identity_path,
        )?)
    }

    /// Rebuild the authoritative channel list from the store and resync
    fn resync_channels(&self, service: &MeshService) -> Result<()> {
        let defs: Vec<ChannelDef> = self
            .storage
            .list_channels()?
            .into_iter()
            .map(|r| ChannelDef {
                name: r.name,
                secret: r.secret,
                is_private: r.is_private,
            })
            .collect();
        service.channel_registry().resync(&defs)?;
        Ok(())
    }

    /// First run: make sure the well-known Public channel is joined
    fn ensure_default_channel(&self, service: &MeshService) -> Result<()> {
        if self.config.channels().is_empty() && self.storage.list_channels()?.is_empty() {
            service
                .channel_registry()
                .resync(&[ChannelDef::public("Public")])?;
            println!("Joined default channel: Public");
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    let data_dir = cli.data_dir.unwrap_or_else(default_data_dir);
    let node = Node::open(&data_dir)?;

    match cli.command {
        Commands::Info => {
            let config = node.config.snapshot();
            println!("Meshlink v0.1.0");
            println!();
            println!("Node:");
            println!(
                "  Name: {}",
                if config.node_name.is_empty() {
                    "(unset)"
                } else {
                    &config.node_name
                }
            );
            println!(
                "  Hardware: {}",
                if config.hardware_preset.is_empty() {
                    "(unset)"
                } else {
                    &config.hardware_preset
                }
            );
            println!(
                "  Region: {}",
                if config.region_preset.is_empty() {
                    "(unset)"
                } else {
                    &config.region_preset
                }
            );
            println!();
            println!("Data directory: {}", data_dir.display());
            println!("Channels: {}", node.storage.list_channels()?.len());
            println!("Contacts: {}", node.storage.list_contacts()?.len());
            println!();
            println!("Hardware presets:");
            for (name, _) in meshlink_core::config::hardware_presets() {
                println!("  {}", name);
            }
            println!("Region presets:");
            for (name, _) in meshlink_core::config::region_presets() {
                println!("  {}", name);
            }
        }

        Commands::Setup {
            name,
            hardware,
            region,
        } => {
            let mut config = node.config.snapshot();
            if let Some(name) = name {
                config.node_name = name;
            }
            if let Some(hardware) = hardware {
                config.apply_hardware_preset(&hardware)?;
            }
            if let Some(region) = region {
                config.apply_region_preset(&region)?;
            }
            node.config.replace(config);
            node.config.save()?;
            println!("Configuration saved.");
        }

        Commands::Channel { action } => match action {
            ChannelAction::Join { name, secret } => {
                let service = node.service()?;
                let is_private = secret.is_some();
                let mut defs: Vec<ChannelDef> = node
                    .storage
                    .list_channels()?
                    .into_iter()
                    .map(|r| ChannelDef {
                        name: r.name,
                        secret: r.secret,
                        is_private: r.is_private,
                    })
                    .collect();
                if !defs.iter().any(|d| d.name == name) {
                    defs.push(ChannelDef {
                        name: name.clone(),
                        secret,
                        is_private,
                    });
                }
                service.channel_registry().resync(&defs)?;
                println!("Joined channel: {}", name);
            }

            ChannelAction::Leave { name } => {
                // Row removal is the client's job; resync aligns the rest
                node.storage.delete_channel(&name)?;
                let service = node.service()?;
                node.resync_channels(&service)?;
                println!("Left channel: {}", name);
            }

            ChannelAction::List => {
                let channels = node.storage.list_channels()?;
                if channels.is_empty() {
                    println!("No channels joined.");
                } else {
                    println!("Channels ({}):", channels.len());
                    println!();
                    for channel in channels {
                        let kind = if channel.is_private { " [private]" } else { "" };
                        let secret = channel
                            .secret
                            .unwrap_or_else(|| derive_channel_secret(&channel.name));
                        println!("  {}{}", channel.name, kind);
                        println!("    secret: {}", secret);
                    }
                }
            }
        },

        Commands::Contact { action } => match action {
            ContactAction::Add { public_key, name } => {
                let key = hex::decode(&public_key)
                    .map_err(|e| anyhow::anyhow!("Invalid hex public key: {}", e))?;
                let service = node.service()?;
                let contact = service.directory().upsert(&key, &name)?;
                println!("Added contact: {} ({})", contact.display_name(), contact.key_prefix());
            }

            ContactAction::List => {
                let service = node.service()?;
                let contacts = service.directory().contacts();
                if contacts.is_empty() {
                    println!("No contacts known.");
                } else {
                    println!("Contacts ({}):", contacts.len());
                    println!();
                    for contact in contacts {
                        println!("  {} ({})", contact.display_name(), contact.key_hex());
                    }
                }
            }
        },

        Commands::Send { channel, text } => {
            let mut service = node.service()?;
            service.start().await?;
            let sent = service.send_channel_message(&channel, &text).await;
            service.stop().await;
            if sent {
                println!("Sent to {}: {}", channel, text);
            } else {
                anyhow::bail!("Send failed (no protocol engine or radio rejected the send)");
            }
        }

        Commands::Dm { contact, text } => {
            let mut service = node.service()?;
            service.start().await?;
            let sent = service.send_direct_message(&contact, &text).await;
            service.stop().await;
            if sent {
                println!("Sent to {}: {}", contact, text);
            } else {
                anyhow::bail!("Send failed (no protocol engine or radio rejected the send)");
            }
        }

        Commands::Advert => {
            let mut service = node.service()?;
            service.start().await?;
            let sent = service.send_advert().await;
            service.stop().await;
            if sent {
                println!("Advert sent.");
            } else {
                anyhow::bail!("Advert failed (no protocol engine available)");
            }
        }

        Commands::Serve => {
            let mut service = node.service()?;
            node.ensure_default_channel(&service)?;
            let mut events = service.subscribe();

            service.start().await?;
            println!("Meshlink session started.");
            println!("  Identity: {}", service.identity_summary());
            println!("  State: {}", service.state());
            if service.is_simulated() {
                println!("  Radio: simulated");
            }
            println!();
            println!("Streaming events. Press Ctrl+C to stop.");
            println!();

            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        println!();
                        println!("Received shutdown signal...");
                        break;
                    }
                    event = events.recv() => match event {
                        Ok(InboundEvent::ChannelMessage { channel, sender_name, text, .. }) => {
                            println!("[{}] {}: {}", channel, sender_name, text);
                        }
                        Ok(InboundEvent::DirectMessage { sender_name, text, .. }) => {
                            println!("[dm] {}: {}", sender_name, text);
                        }
                        Ok(InboundEvent::ContactDiscovered { name, public_key }) => {
                            println!("[mesh] discovered contact {} ({})", name, &public_key[..16.min(public_key.len())]);
                        }
                        Ok(InboundEvent::SystemError { message }) => {
                            eprintln!("[error] {}", message);
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                            eprintln!("[warn] dropped {} events, consumer too slow", missed);
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    }
                }
            }

            println!("Shutting down...");
            service.stop().await;
            println!("Goodbye.");
        }
    }

    Ok(())
}
