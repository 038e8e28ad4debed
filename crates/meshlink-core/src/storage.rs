//! Persistent storage using redb
//!
//! This module provides ACID-compliant storage for:
//! - Contacts (keyed by public key)
//! - Channels (keyed by name)
//! - Message history (append-only, client-driven)
//!
//! The store is one of the three views of channel/contact state and is the
//! authoritative one: `ChannelRegistry::resync` writes it first so that a
//! crash mid-sync leaves it as the source of truth for the next start.

use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use redb::Database;

use crate::error::MeshError;

// Submodules
mod channels;
mod contacts;
mod messages;

use channels::CHANNELS_TABLE;
use contacts::CONTACTS_TABLE;
use messages::MESSAGES_TABLE;

/// Storage layer using redb for ACID-compliant persistence
#[derive(Clone)]
pub struct Storage {
    db: Arc<RwLock<Database>>,
}

impl Storage {
    /// Create a new storage instance at the given path.
    ///
    /// This will:
    /// - Create the database directory if it doesn't exist
    /// - Initialize the database file
    /// - Create all required tables
    pub fn new(path: impl AsRef<Path>) -> Result<Self, MeshError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::create(path)?;

        // Initialize all tables
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(CONTACTS_TABLE)?;
            let _ = write_txn.open_table(CHANNELS_TABLE)?;
            let _ = write_txn.open_table(MESSAGES_TABLE)?;
        }
        write_txn.commit()?;

        Ok(Self {
            db: Arc::new(RwLock::new(db)),
        })
    }

    /// Get a reference to the shared database handle
    pub(crate) fn db_handle(&self) -> Arc<RwLock<Database>> {
        self.db.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_storage_can_be_created() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.redb");
        let storage = Storage::new(&db_path);
        assert!(storage.is_ok());
    }

    #[test]
    fn test_storage_creates_parent_directories() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("nested/path/to/test.redb");
        let storage = Storage::new(&db_path);
        assert!(storage.is_ok());
        assert!(db_path.exists());
    }
}
