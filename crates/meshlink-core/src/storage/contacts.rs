//! Contact storage - rows keyed by public key
//!
//! The row key is the lowercase hex public key. `added_at` stamps preserve
//! insertion order so the in-memory contact directory can rebuild its list
//! deterministically across restarts.

use redb::{ReadableTable, TableDefinition};

use crate::error::MeshError;
use crate::types::ContactRecord;

use super::Storage;

/// Table for contacts (key: hex public key, value: serialized ContactRecord)
pub(crate) const CONTACTS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("contacts");

impl Storage {
    /// Insert or update a contact row
    ///
    /// An existing row keeps its `added_at` stamp and keeps its name when
    /// the incoming name is empty; `last_seen` is always refreshed.
    pub fn upsert_contact(&self, public_key: &[u8], name: &str) -> Result<ContactRecord, MeshError> {
        let key = hex::encode(public_key);
        let db = self.db_handle();
        let db_guard = db.read();
        let write_txn = db_guard.begin_write()?;
        let record = {
            let mut table = write_txn.open_table(CONTACTS_TABLE)?;

            let mut record = match table.get(key.as_str())? {
                Some(existing) => {
                    let mut record: ContactRecord = postcard::from_bytes(existing.value())
                        .map_err(|e| MeshError::Serialization(e.to_string()))?;
                    if !name.is_empty() {
                        record.name = name.to_string();
                    }
                    record
                }
                None => ContactRecord::new(public_key, name),
            };
            record.last_seen = chrono::Utc::now().timestamp();

            let serialized = postcard::to_allocvec(&record)
                .map_err(|e| MeshError::Serialization(e.to_string()))?;
            table.insert(key.as_str(), serialized.as_slice())?;
            record
        };
        write_txn.commit()?;
        Ok(record)
    }

    /// Load a contact row by public key
    ///
    /// Returns `None` if no contact exists for the given key.
    pub fn load_contact(&self, public_key: &[u8]) -> Result<Option<ContactRecord>, MeshError> {
        let key = hex::encode(public_key);
        let db = self.db_handle();
        let db_guard = db.read();
        let read_txn = db_guard.begin_read()?;
        let table = read_txn.open_table(CONTACTS_TABLE)?;

        match table.get(key.as_str())? {
            Some(data) => {
                let record: ContactRecord = postcard::from_bytes(data.value())
                    .map_err(|e| MeshError::Serialization(e.to_string()))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// List all contact rows in insertion order (oldest `added_at` first)
    pub fn list_contacts(&self) -> Result<Vec<ContactRecord>, MeshError> {
        let db = self.db_handle();
        let db_guard = db.read();
        let read_txn = db_guard.begin_read()?;
        let table = read_txn.open_table(CONTACTS_TABLE)?;

        let mut records = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            let record: ContactRecord = postcard::from_bytes(value.value())
                .map_err(|e| MeshError::Serialization(e.to_string()))?;
            records.push(record);
        }
        records.sort_by_key(|r| r.added_at);
        Ok(records)
    }

    /// Delete a contact row by public key
    ///
    /// Returns `Ok(())` even if the contact doesn't exist.
    pub fn delete_contact(&self, public_key: &[u8]) -> Result<(), MeshError> {
        let key = hex::encode(public_key);
        let db = self.db_handle();
        let db_guard = db.read();
        let write_txn = db_guard.begin_write()?;
        {
            let mut table = write_txn.open_table(CONTACTS_TABLE)?;
            table.remove(key.as_str())?;
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
    fn test_upsert_and_load_contact() {
        let (storage, _temp) = create_test_storage();

        storage.upsert_contact(&[0xAA; 32], "alice").unwrap();
        let loaded = storage.load_contact(&[0xAA; 32]).unwrap().unwrap();
        assert_eq!(loaded.name, "alice");
        assert_eq!(loaded.public_key, vec![0xAA; 32]);
    }

    #[test]
    fn test_upsert_updates_name() {
        let (storage, _temp) = create_test_storage();

        storage.upsert_contact(&[0xAA; 32], "alice").unwrap();
        storage.upsert_contact(&[0xAA; 32], "alice-base").unwrap();

        let loaded = storage.load_contact(&[0xAA; 32]).unwrap().unwrap();
        assert_eq!(loaded.name, "alice-base");
        assert_eq!(storage.list_contacts().unwrap().len(), 1);
    }

    #[test]
    fn test_upsert_empty_name_keeps_existing() {
        let (storage, _temp) = create_test_storage();

        storage.upsert_contact(&[0xAA; 32], "alice").unwrap();
        storage.upsert_contact(&[0xAA; 32], "").unwrap();

        let loaded = storage.load_contact(&[0xAA; 32]).unwrap().unwrap();
        assert_eq!(loaded.name, "alice");
    }

    #[test]
    fn test_load_missing_contact() {
        let (storage, _temp) = create_test_storage();
        assert!(storage.load_contact(&[0x01; 32]).unwrap().is_none());
    }

    #[test]
    fn test_delete_contact() {
        let (storage, _temp) = create_test_storage();

        storage.upsert_contact(&[0xAA; 32], "alice").unwrap();
        storage.delete_contact(&[0xAA; 32]).unwrap();
        assert!(storage.load_contact(&[0xAA; 32]).unwrap().is_none());

        // Deleting again is not an error
        storage.delete_contact(&[0xAA; 32]).unwrap();
    }
}
