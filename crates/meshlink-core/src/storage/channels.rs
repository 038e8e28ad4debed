//! Channel storage - rows keyed by name
//!
//! Rows are written by `ChannelRegistry::resync` before any other channel
//! view is touched, and removed directly by the client when leaving a
//! channel.

use redb::{ReadableTable, TableDefinition};

use crate::error::MeshError;
use crate::types::ChannelRecord;

use super::Storage;

/// Table for channels (key: channel name, value: serialized ChannelRecord)
pub(crate) const CHANNELS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("channels");

impl Storage {
    /// Insert or overwrite a channel row
    pub fn save_channel(&self, record: &ChannelRecord) -> Result<(), MeshError> {
        let db = self.db_handle();
        let db_guard = db.read();
        let write_txn = db_guard.begin_write()?;
        {
            let mut table = write_txn.open_table(CHANNELS_TABLE)?;
            let serialized = postcard::to_allocvec(record)
                .map_err(|e| MeshError::Serialization(e.to_string()))?;
            table.insert(record.name.as_str(), serialized.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Load a channel row by name
    ///
    /// Returns `None` if no channel exists with the given name.
    pub fn load_channel(&self, name: &str) -> Result<Option<ChannelRecord>, MeshError> {
        let db = self.db_handle();
        let db_guard = db.read();
        let read_txn = db_guard.begin_read()?;
        let table = read_txn.open_table(CHANNELS_TABLE)?;

        match table.get(name)? {
            Some(data) => {
                let record: ChannelRecord = postcard::from_bytes(data.value())
                    .map_err(|e| MeshError::Serialization(e.to_string()))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// List all channel rows ordered by name
    pub fn list_channels(&self) -> Result<Vec<ChannelRecord>, MeshError> {
        let db = self.db_handle();
        let db_guard = db.read();
        let read_txn = db_guard.begin_read()?;
        let table = read_txn.open_table(CHANNELS_TABLE)?;

        let mut records = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            let record: ChannelRecord = postcard::from_bytes(value.value())
                .map_err(|e| MeshError::Serialization(e.to_string()))?;
            records.push(record);
        }
        Ok(records)
    }

    /// Delete a channel row by name
    ///
    /// Returns `Ok(())` even if the channel doesn't exist.
    pub fn delete_channel(&self, name: &str) -> Result<(), MeshError> {
        let db = self.db_handle();
        let db_guard = db.read();
        let write_txn = db_guard.begin_write()?;
        {
            let mut table = write_txn.open_table(CHANNELS_TABLE)?;
            table.remove(name)?;
        }
        write_txn.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_storage() -> (Storage, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let storage = Storage::new(temp_dir.path().join("test.redb")).unwrap();
        (storage, temp_dir)
    }

    #[test]
    fn test_save_and_load_channel() {
        let (storage, _temp) = create_test_storage();

        let record = ChannelRecord {
            name: "Public".to_string(),
            secret: Some("8b3387e9c5cdea6ac9e5edbaa115cd72".to_string()),
            is_private: false,
        };
        storage.save_channel(&record).unwrap();

        let loaded = storage.load_channel("Public").unwrap().unwrap();
        assert_eq!(loaded, record);
    }

    #[test]
    fn test_load_missing_channel() {
        let (storage, _temp) = create_test_storage();
        assert!(storage.load_channel("nowhere").unwrap().is_none());
    }

    #[test]
    fn test_list_channels_sorted_by_name() {
        let (storage, _temp) = create_test_storage();

        for name in ["zulu", "alpha", "mike"] {
            storage
                .save_channel(&ChannelRecord {
                    name: name.to_string(),
                    secret: None,
                    is_private: false,
                })
                .unwrap();
        }

        let names: Vec<_> = storage
            .list_channels()
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["alpha", "mike", "zulu"]);
    }

    #[test]
    fn test_delete_channel() {
        let (storage, _temp) = create_test_storage();

        storage
            .save_channel(&ChannelRecord {
                name: "ops".to_string(),
                secret: None,
                is_private: false,
            })
            .unwrap();
        storage.delete_channel("ops").unwrap();
        assert!(storage.load_channel("ops").unwrap().is_none());

        // Deleting again is not an error
        storage.delete_channel("ops").unwrap();
    }
}
