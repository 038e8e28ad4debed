//! Core types for Meshlink

use serde::{Deserialize, Serialize};

/// A known mesh contact
///
/// Contacts are unique by public key. `first_byte` caches the first byte of
/// the key, which is all a direct-message packet carries to identify its
/// sender (see the source-hash resolution in the packet translator).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    /// Full public key bytes (32 bytes on this mesh)
    pub public_key: Vec<u8>,
    /// Display name, may be updated in place
    pub name: String,
    /// First byte of `public_key`, used for fast sender matching
    pub first_byte: u8,
}

impl Contact {
    /// Create a contact from a non-empty public key and a display name
    pub fn new(public_key: impl Into<Vec<u8>>, name: impl Into<String>) -> Self {
        let public_key = public_key.into();
        let first_byte = public_key.first().copied().unwrap_or(0);
        Self {
            public_key,
            name: name.into(),
            first_byte,
        }
    }

    /// Public key as lowercase hex
    pub fn key_hex(&self) -> String {
        hex::encode(&self.public_key)
    }

    /// Short key prefix for display when no name is known
    pub fn key_prefix(&self) -> String {
        let full = self.key_hex();
        full.chars().take(16).collect()
    }

    /// Name if set, otherwise a key prefix
    pub fn display_name(&self) -> String {
        if self.name.is_empty() {
            self.key_prefix()
        } else {
            self.name.clone()
        }
    }
}

/// A channel definition as decided by the client
///
/// This is the authoritative input to `ChannelRegistry::resync`. A missing
/// secret is filled in deterministically from the channel name before the
/// definition reaches the configuration or the protocol engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelDef {
    /// Channel name, unique
    pub name: String,
    /// Shared secret as 32 hex chars; derived from the name when absent
    pub secret: Option<String>,
    /// Whether the channel was joined with a user-supplied secret
    pub is_private: bool,
}

impl ChannelDef {
    /// Create a public channel definition with no explicit secret
    pub fn public(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            secret: None,
            is_private: false,
        }
    }

    /// Create a private channel definition with an explicit secret
    pub fn private(name: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            secret: Some(secret.into()),
            is_private: true,
        }
    }
}

/// A fully-resolved channel as the configuration and the protocol engine see it
///
/// Unlike [`ChannelDef`] the secret is always present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelEntry {
    /// Channel name, unique
    pub name: String,
    /// Shared secret as 32 hex chars, never empty
    pub secret: String,
}

/// Persistent contact row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactRecord {
    /// Full public key bytes
    pub public_key: Vec<u8>,
    /// Display name
    pub name: String,
    /// Insertion stamp (Unix microseconds); preserves directory order across restarts
    pub added_at: i64,
    /// Unix timestamp of the most recent upsert
    pub last_seen: i64,
}

impl ContactRecord {
    /// Create a new record stamped with the current time
    pub fn new(public_key: impl Into<Vec<u8>>, name: impl Into<String>) -> Self {
        let now = chrono::Utc::now();
        Self {
            public_key: public_key.into(),
            name: name.into(),
            added_at: now.timestamp_micros(),
            last_seen: now.timestamp(),
        }
    }
}

/// Persistent channel row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRecord {
    /// Channel name, unique
    pub name: String,
    /// Shared secret as 32 hex chars, if one was chosen at join time
    pub secret: Option<String>,
    /// Whether the channel was joined with a user-supplied secret
    pub is_private: bool,
}

/// Persistent message row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Unix timestamp of the message
    pub timestamp: i64,
    /// Sender public key hex, if known
    pub sender_id: Option<String>,
    /// Sender display name, if known
    pub sender_name: Option<String>,
    /// Channel name for channel messages, contact key for direct messages
    pub channel_id: Option<String>,
    /// Message text
    pub content: String,
    /// Whether this is a direct message
    pub is_dm: bool,
}
