//! In-memory contact directory backed by persistent storage
//!
//! The directory doubles as the contact adapter handed by reference into
//! the protocol engine: the engine reads `contacts()` and calls
//! `add_contact`, everything else in the process treats the cache as
//! read-only. Single-writer rule: only this type mutates the cache, and
//! only through `upsert`/`refresh`.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::error::MeshError;
use crate::storage::Storage;
use crate::types::Contact;

/// Cache of known contacts with non-empty public keys
pub struct ContactDirectory {
    storage: Arc<Storage>,
    contacts: RwLock<Vec<Contact>>,
}

impl ContactDirectory {
    /// Build the directory, loading the cache from storage in insertion order
    pub fn load(storage: Arc<Storage>) -> Result<Self, MeshError> {
        let directory = Self {
            storage,
            contacts: RwLock::new(Vec::new()),
        };
        directory.refresh()?;
        Ok(directory)
    }

    /// Re-read the cache from storage
    ///
    /// Rows without a public key never make it into the cache; sender
    /// resolution has nothing to match them against.
    pub fn refresh(&self) -> Result<(), MeshError> {
        let contacts: Vec<Contact> = self
            .storage
            .list_contacts()?
            .into_iter()
            .filter(|r| !r.public_key.is_empty())
            .map(|r| Contact::new(r.public_key, r.name))
            .collect();
        debug!(count = contacts.len(), "Contact directory refreshed");
        *self.contacts.write() = contacts;
        Ok(())
    }

    /// Point-in-time snapshot of the cache, in insertion order
    pub fn contacts(&self) -> Vec<Contact> {
        self.contacts.read().clone()
    }

    /// Number of cached contacts
    pub fn len(&self) -> usize {
        self.contacts.read().len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.contacts.read().is_empty()
    }

    /// First contact with the given display name, case-sensitive
    pub fn find_by_name(&self, name: &str) -> Option<Contact> {
        self.contacts.read().iter().find(|c| c.name == name).cloned()
    }

    /// First contact whose public key starts with the given byte
    ///
    /// A single byte of keyspace is all a direct-message packet carries, so
    /// this is a collision-prone heuristic: two contacts can share a first
    /// byte, and the earlier-inserted one wins. That ambiguity is inherent
    /// to the packet format, not something to resolve here.
    pub fn find_by_first_byte(&self, byte: u8) -> Option<Contact> {
        self.contacts
            .read()
            .iter()
            .find(|c| c.first_byte == byte)
            .cloned()
    }

    /// Add or update a contact in the store and the cache
    ///
    /// De-duplicated by public key. A non-empty cached name is never
    /// replaced by an empty one. Returns the resulting contact.
    ///
    /// # Errors
    ///
    /// Returns `MeshError::InvalidOperation` for an empty public key and
    /// storage errors from the write-through.
    pub fn upsert(&self, public_key: &[u8], name: &str) -> Result<Contact, MeshError> {
        if public_key.is_empty() {
            return Err(MeshError::InvalidOperation(
                "contact public key must not be empty".to_string(),
            ));
        }

        let record = self.storage.upsert_contact(public_key, name)?;
        let contact = Contact::new(record.public_key, record.name);

        let mut contacts = self.contacts.write();
        match contacts.iter_mut().find(|c| c.public_key == contact.public_key) {
            Some(existing) => {
                if !contact.name.is_empty() {
                    existing.name = contact.name.clone();
                }
            }
            None => {
                info!(name = %contact.display_name(), key = %contact.key_prefix(), "Contact added");
                contacts.push(contact.clone());
            }
        }
        Ok(contact)
    }

    /// Engine-facing alias for `upsert`, matching the contact adapter contract
    pub fn add_contact(&self, public_key: &[u8], name: &str) -> Result<Contact, MeshError> {
        self.upsert(public_key, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_directory() -> (ContactDirectory, TempDir) {
        let temp = TempDir::new().unwrap();
        let storage = Arc::new(Storage::new(temp.path().join("test.redb")).unwrap());
        let directory = ContactDirectory::load(storage).unwrap();
        (directory, temp)
    }

    fn key(first: u8) -> Vec<u8> {
        let mut k = vec![0x11; 32];
        k[0] = first;
        k
    }

    #[test]
    fn test_upsert_appends_and_dedupes() {
        let (dir, _temp) = create_test_directory();

        dir.upsert(&key(0x01), "alice").unwrap();
        dir.upsert(&key(0x02), "bob").unwrap();
        dir.upsert(&key(0x01), "alice").unwrap();

        assert_eq!(dir.len(), 2);
    }

    #[test]
    fn test_upsert_rejects_empty_key() {
        let (dir, _temp) = create_test_directory();
        assert!(matches!(
            dir.upsert(&[], "ghost"),
            Err(MeshError::InvalidOperation(_))
        ));
    }

    #[test]
    fn test_upsert_never_clears_a_name() {
        let (dir, _temp) = create_test_directory();

        dir.upsert(&key(0x01), "alice").unwrap();
        dir.upsert(&key(0x01), "").unwrap();

        assert_eq!(dir.find_by_first_byte(0x01).unwrap().name, "alice");
    }

    #[test]
    fn test_upsert_updates_name_in_place() {
        let (dir, _temp) = create_test_directory();

        dir.upsert(&key(0x01), "alice").unwrap();
        dir.upsert(&key(0x01), "alice-base").unwrap();

        assert_eq!(dir.find_by_name("alice-base").unwrap().first_byte, 0x01);
        assert!(dir.find_by_name("alice").is_none());
    }

    #[test]
    fn test_find_by_name_is_case_sensitive() {
        let (dir, _temp) = create_test_directory();

        dir.upsert(&key(0x01), "Alice").unwrap();
        assert!(dir.find_by_name("alice").is_none());
        assert!(dir.find_by_name("Alice").is_some());
    }

    #[test]
    fn test_find_by_first_byte_matches_key_head() {
        let (dir, _temp) = create_test_directory();

        dir.upsert(&key(0xA3), "carol").unwrap();
        let found = dir.find_by_first_byte(0xA3).unwrap();
        assert_eq!(found.public_key[0], 0xA3);
        assert!(dir.find_by_first_byte(0xA4).is_none());
    }

    #[test]
    fn test_first_byte_collision_prefers_earlier_insertion() {
        let (dir, _temp) = create_test_directory();

        let mut first = key(0xA3);
        first[1] = 0x01;
        let mut second = key(0xA3);
        second[1] = 0x02;

        dir.upsert(&first, "early").unwrap();
        dir.upsert(&second, "late").unwrap();

        assert_eq!(dir.find_by_first_byte(0xA3).unwrap().name, "early");
    }

    #[test]
    fn test_refresh_survives_restart() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("test.redb");

        {
            let storage = Arc::new(Storage::new(&path).unwrap());
            let dir = ContactDirectory::load(storage).unwrap();
            dir.upsert(&key(0x01), "alice").unwrap();
        }

        let storage = Arc::new(Storage::new(&path).unwrap());
        let dir = ContactDirectory::load(storage).unwrap();
        assert_eq!(dir.find_by_name("alice").unwrap().first_byte, 0x01);
    }
}
