//! Error types for Meshlink

use thiserror::Error;

/// Main error type for Meshlink operations
#[derive(Error, Debug)]
pub enum MeshError {
    /// Identity seed file is corrupt or unreadable (fatal at startup)
    #[error("Identity error: {0}")]
    Identity(String),

    /// Radio hardware could not be initialised
    #[error("Radio init failed: {0}")]
    RadioInit(String),

    /// Protocol engine dependency is not available
    #[error("Protocol engine unavailable")]
    EngineUnavailable,

    /// A send operation failed
    #[error("Send failed: {0}")]
    Send(String),

    /// An inbound packet could not be decoded
    #[error("Decode failed: {0}")]
    Decode(String),

    /// A channel resync failed partway; the persistent store stays authoritative
    #[error("Channel sync failed: {0}")]
    Sync(String),

    /// Configuration file or preset error
    #[error("Config error: {0}")]
    Config(String),

    /// Error during storage operations (redb)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Database creation/opening error
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    /// Transaction error
    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    /// Table error
    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    /// Storage operation error
    #[error("Storage operation error: {0}")]
    StorageOp(#[from] redb::StorageError),

    /// Commit error
    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    /// Error during serialization/deserialization
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// General I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Contact not found in storage
    #[error("Contact not found: {0}")]
    ContactNotFound(String),

    /// Channel not found in storage
    #[error("Channel not found: {0}")]
    ChannelNotFound(String),

    /// Invalid operation for current session state
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

/// Result type alias using MeshError
pub type MeshResult<T> = Result<T, MeshError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MeshError::ChannelNotFound("Public".to_string());
        assert_eq!(format!("{}", err), "Channel not found: Public");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let mesh_err: MeshError = io_err.into();
        assert!(matches!(mesh_err, MeshError::Io(_)));
    }

    #[test]
    fn test_engine_unavailable_display() {
        let err = MeshError::EngineUnavailable;
        assert_eq!(format!("{}", err), "Protocol engine unavailable");
    }
}
