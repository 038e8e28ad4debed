//! Channel registry: three-way sync of channel state
//!
//! Channel definitions exist in three places that must agree after any
//! mutating operation: the persistent store, the runtime configuration,
//! and the live adapter the protocol engine decrypts against. `resync` is
//! the only path allowed to touch all three, in store → config → adapter
//! order so a crash mid-sync always leaves the store as the most
//! up-to-date source of truth for the next start.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::config::ConfigStore;
use crate::error::MeshError;
use crate::storage::Storage;
use crate::types::{ChannelDef, ChannelEntry, ChannelRecord};

/// Well-known channel secrets (ecosystem-wide constants)
const WELL_KNOWN_SECRETS: &[(&str, &str)] = &[("Public", "8b3387e9c5cdea6ac9e5edbaa115cd72")];

/// Derive the shared secret for a channel name
///
/// Reserved names map to well-known ecosystem secrets; every other name
/// hashes to a truncated SHA-256 digest. Same name, same secret, always.
pub fn derive_channel_secret(name: &str) -> String {
    if let Some((_, secret)) = WELL_KNOWN_SECRETS.iter().find(|(n, _)| *n == name) {
        return (*secret).to_string();
    }
    let digest = Sha256::digest(name.as_bytes());
    hex::encode(digest)[..32].to_string()
}

/// Live channel list shared by reference with the protocol engine
///
/// Single-writer rule: only `ChannelRegistry::resync` replaces the list;
/// the engine only reads it.
#[derive(Default)]
pub struct ChannelAdapter {
    channels: RwLock<Vec<ChannelEntry>>,
}

impl ChannelAdapter {
    /// Create an adapter seeded with an initial channel list
    pub fn new(channels: Vec<ChannelEntry>) -> Self {
        Self {
            channels: RwLock::new(channels),
        }
    }

    /// Current channel list
    pub fn get_channels(&self) -> Vec<ChannelEntry> {
        self.channels.read().clone()
    }

    /// Replace the channel list in place
    pub fn set_channels(&self, channels: Vec<ChannelEntry>) {
        debug!(count = channels.len(), "Channel adapter updated");
        *self.channels.write() = channels;
    }
}

/// Reconciles channel definitions across store, config, and live adapter
///
/// Owns no locks of its own: callers serialize `resync` invocations on
/// their own control path, never calling it concurrently with itself.
pub struct ChannelRegistry {
    storage: Arc<Storage>,
    config: Arc<ConfigStore>,
    adapter: Arc<ChannelAdapter>,
    engine_running: Arc<AtomicBool>,
}

impl ChannelRegistry {
    /// Create a registry over the three channel views
    ///
    /// `engine_running` is shared with the session controller and gates the
    /// live-adapter step.
    pub fn new(
        storage: Arc<Storage>,
        config: Arc<ConfigStore>,
        adapter: Arc<ChannelAdapter>,
        engine_running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            storage,
            config,
            adapter,
            engine_running,
        }
    }

    /// The live adapter handed into the protocol engine
    pub fn adapter(&self) -> Arc<ChannelAdapter> {
        self.adapter.clone()
    }

    /// Rewrite all three channel views to match the authoritative list
    ///
    /// Ordering is store → configuration → live adapter. The store step
    /// adds missing rows and leaves existing ones; removing rows for a
    /// "leave" is the caller's job before invoking resync. The adapter
    /// step runs only while the engine is running; otherwise it is skipped
    /// and the engine picks up the config on next start.
    ///
    /// # Errors
    ///
    /// A failure at any step propagates as `MeshError::Sync` and leaves
    /// the persistent store authoritative.
    pub fn resync(&self, channels: &[ChannelDef]) -> Result<Vec<ChannelEntry>, MeshError> {
        // 1. Persistent store: add missing rows, leave existing
        for def in channels {
            if self.storage.load_channel(&def.name).map_err(sync_err)?.is_none() {
                self.storage
                    .save_channel(&ChannelRecord {
                        name: def.name.clone(),
                        secret: def.secret.clone(),
                        is_private: def.is_private,
                    })
                    .map_err(sync_err)?;
            }
        }

        // 2. Runtime configuration: overwrite with resolved secrets, persist
        let resolved: Vec<ChannelEntry> = channels
            .iter()
            .map(|def| ChannelEntry {
                name: def.name.clone(),
                secret: def
                    .secret
                    .clone()
                    .filter(|s| !s.is_empty())
                    .unwrap_or_else(|| derive_channel_secret(&def.name)),
            })
            .collect();
        self.config.set_channels(resolved.clone());
        self.config.save().map_err(sync_err)?;

        // 3. Live adapter: only while the engine is running
        if self.engine_running.load(Ordering::SeqCst) {
            self.adapter.set_channels(resolved.clone());
        } else {
            debug!("Engine not running, live adapter step skipped");
        }

        info!(count = resolved.len(), "Channel resync complete");
        Ok(resolved)
    }
}

fn sync_err(e: MeshError) -> MeshError {
    MeshError::Sync(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct Fixture {
        registry: ChannelRegistry,
        storage: Arc<Storage>,
        config: Arc<ConfigStore>,
        adapter: Arc<ChannelAdapter>,
        engine_running: Arc<AtomicBool>,
        _temp: TempDir,
    }

    fn fixture() -> Fixture {
        let temp = TempDir::new().unwrap();
        let storage = Arc::new(Storage::new(temp.path().join("test.redb")).unwrap());
        let config = Arc::new(ConfigStore::new(temp.path().join("config.json")));
        let adapter = Arc::new(ChannelAdapter::default());
        let engine_running = Arc::new(AtomicBool::new(true));
        let registry = ChannelRegistry::new(
            storage.clone(),
            config.clone(),
            adapter.clone(),
            engine_running.clone(),
        );
        Fixture {
            registry,
            storage,
            config,
            adapter,
            engine_running,
            _temp: temp,
        }
    }

    #[test]
    fn test_derivation_is_deterministic() {
        assert_eq!(derive_channel_secret("ops"), derive_channel_secret("ops"));
        assert_ne!(derive_channel_secret("ops"), derive_channel_secret("Ops"));
        assert_eq!(derive_channel_secret("ops").len(), 32);
    }

    #[test]
    fn test_well_known_secret_for_public() {
        assert_eq!(
            derive_channel_secret("Public"),
            "8b3387e9c5cdea6ac9e5edbaa115cd72"
        );
    }

    #[test]
    fn test_resync_aligns_all_three_views() {
        let f = fixture();
        let defs = vec![
            ChannelDef::public("Public"),
            ChannelDef::private("ops", "00112233445566778899aabbccddeeff"),
        ];

        let resolved = f.registry.resync(&defs).unwrap();

        let expected: Vec<(String, String)> = vec![
            ("Public".to_string(), derive_channel_secret("Public")),
            (
                "ops".to_string(),
                "00112233445566778899aabbccddeeff".to_string(),
            ),
        ];

        let as_pairs =
            |entries: Vec<ChannelEntry>| -> Vec<(String, String)> {
                entries.into_iter().map(|e| (e.name, e.secret)).collect()
            };

        assert_eq!(as_pairs(resolved), expected);
        assert_eq!(as_pairs(f.config.channels()), expected);
        assert_eq!(as_pairs(f.adapter.get_channels()), expected);

        let store_names: Vec<_> = f
            .storage
            .list_channels()
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(store_names, vec!["Public", "ops"]);
    }

    #[test]
    fn test_resync_persists_config_to_disk() {
        let f = fixture();
        f.registry.resync(&[ChannelDef::public("Public")]).unwrap();

        let reloaded = ConfigStore::new(f.config.path());
        reloaded.load().unwrap();
        assert_eq!(reloaded.channels().len(), 1);
        assert_eq!(reloaded.channels()[0].secret, derive_channel_secret("Public"));
    }

    #[test]
    fn test_resync_leaves_existing_rows_untouched() {
        let f = fixture();

        // A row joined earlier with an explicit secret
        f.storage
            .save_channel(&ChannelRecord {
                name: "ops".to_string(),
                secret: Some("feedfacefeedfacefeedfacefeedface".to_string()),
                is_private: true,
            })
            .unwrap();

        f.registry.resync(&[ChannelDef::public("ops")]).unwrap();

        let row = f.storage.load_channel("ops").unwrap().unwrap();
        assert_eq!(row.secret.as_deref(), Some("feedfacefeedfacefeedfacefeedface"));
        assert!(row.is_private);
    }

    #[test]
    fn test_resync_skips_adapter_when_engine_stopped() {
        let f = fixture();
        f.engine_running.store(false, Ordering::SeqCst);

        f.registry.resync(&[ChannelDef::public("Public")]).unwrap();

        assert!(f.adapter.get_channels().is_empty());
        assert_eq!(f.config.channels().len(), 1);
    }

    #[test]
    fn test_resync_twice_is_stable() {
        let f = fixture();
        let defs = vec![ChannelDef::public("Public"), ChannelDef::public("camp")];

        let first = f.registry.resync(&defs).unwrap();
        let second = f.registry.resync(&defs).unwrap();
        assert_eq!(first, second);
    }
}
