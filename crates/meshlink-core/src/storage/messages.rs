//! Message history storage - append-only rows with a u64 counter key
//!
//! The core never writes this table on packet receipt; persisting received
//! messages is the client's responsibility, exercised through these row
//! operations.

use redb::{ReadableTable, TableDefinition};

use crate::error::MeshError;
use crate::types::MessageRecord;

use super::Storage;

/// Table for messages (key: monotonic counter, value: serialized MessageRecord)
pub(crate) const MESSAGES_TABLE: TableDefinition<u64, &[u8]> = TableDefinition::new("messages");

impl Storage {
    /// Append a message row, returning its assigned id
    pub fn append_message(&self, record: &MessageRecord) -> Result<u64, MeshError> {
        let db = self.db_handle();
        let db_guard = db.read();
        let write_txn = db_guard.begin_write()?;
        let id = {
            let mut table = write_txn.open_table(MESSAGES_TABLE)?;
            let next_id = match table.last()? {
                Some((key, _)) => key.value() + 1,
                None => 0,
            };
            let serialized = postcard::to_allocvec(record)
                .map_err(|e| MeshError::Serialization(e.to_string()))?;
            table.insert(next_id, serialized.as_slice())?;
            next_id
        };
        write_txn.commit()?;
        Ok(id)
    }

    /// Load up to `limit` most recent channel messages, oldest first
    pub fn channel_messages(
        &self,
        channel: &str,
        limit: usize,
    ) -> Result<Vec<MessageRecord>, MeshError> {
        self.filtered_messages(limit, |r| {
            !r.is_dm && r.channel_id.as_deref() == Some(channel)
        })
    }

    /// Load up to `limit` most recent direct messages with a contact, oldest first
    ///
    /// Matches both directions: rows filed under the contact's key and rows
    /// sent by the contact.
    pub fn direct_messages(
        &self,
        contact_key: &str,
        limit: usize,
    ) -> Result<Vec<MessageRecord>, MeshError> {
        self.filtered_messages(limit, |r| {
            r.is_dm
                && (r.channel_id.as_deref() == Some(contact_key)
                    || r.sender_id.as_deref() == Some(contact_key))
        })
    }

    fn filtered_messages(
        &self,
        limit: usize,
        keep: impl Fn(&MessageRecord) -> bool,
    ) -> Result<Vec<MessageRecord>, MeshError> {
        let db = self.db_handle();
        let db_guard = db.read();
        let read_txn = db_guard.begin_read()?;
        let table = read_txn.open_table(MESSAGES_TABLE)?;

        // Walk newest-first so the limit keeps the most recent rows
        let mut records = Vec::new();
        for entry in table.iter()?.rev() {
            let (_, value) = entry?;
            let record: MessageRecord = postcard::from_bytes(value.value())
                .map_err(|e| MeshError::Serialization(e.to_string()))?;
            if keep(&record) {
                records.push(record);
                if records.len() >= limit {
                    break;
                }
            }
        }
        records.reverse();
        Ok(records)
    }
}
