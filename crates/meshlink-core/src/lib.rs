//! Meshlink Core Library
//!
//! Session orchestration for LoRa mesh chat nodes. Meshlink sits between
//! an external mesh protocol engine (identity, encryption, packet
//! dispatch, hardware control) and an interactive client: it brings a mesh
//! session up and down safely, keeps the persistent store, the runtime
//! configuration, and the engine's live adapters mutually consistent, and
//! translates raw inbound packets into typed application events.
//!
//! ## Overview
//!
//! - **Local-first**: contacts, channels, and history live in an embedded
//!   redb database; the node is fully usable offline
//! - **Hardware-optional**: a deterministic simulated radio stands in when
//!   no LoRa hardware is configured, so the whole stack runs anywhere
//! - **Degraded over dead**: radio or engine failures reduce capability
//!   and surface one `SystemError` event each instead of taking the
//!   session down
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use meshlink_core::{ConfigStore, MeshService, Storage};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Arc::new(ConfigStore::new("~/.meshlink/config.json"));
//!     config.load()?;
//!     let storage = Arc::new(Storage::new("~/.meshlink/meshlink.redb")?);
//!
//!     let mut service = MeshService::new(config, storage, "~/.meshlink/identity.key")?;
//!     let mut events = service.subscribe();
//!     service.start().await?;
//!
//!     while let Ok(event) = events.recv().await {
//!         println!("{:?}", event);
//!     }
//!
//!     service.stop().await;
//!     Ok(())
//! }
//! ```

pub mod channels;
pub mod config;
pub mod directory;
pub mod engine;
pub mod error;
pub mod events;
pub mod identity;
pub mod packet;
pub mod radio;
pub mod service;
pub mod sim;
pub mod storage;
pub mod translate;
pub mod types;

// Re-exports
pub use channels::{derive_channel_secret, ChannelAdapter, ChannelRegistry};
pub use config::{Config, ConfigStore, HardwareParams, RadioParams};
pub use directory::ContactDirectory;
pub use engine::{EngineBuilder, EngineContext, NoopEngine, PacketCallback, ProtocolEngine, SendOutcome};
pub use error::{MeshError, MeshResult};
pub use events::{InboundEvent, SessionState};
pub use identity::{load_or_create_seed, NodeIdentity};
pub use packet::{decode_appdata, Decrypted, GroupTextData, InboundPacket};
pub use radio::{Radio, RadioAck, RadioBuilder};
pub use service::MeshService;
pub use sim::SimRadio;
pub use storage::Storage;
pub use translate::PacketTranslator;
pub use types::*;
