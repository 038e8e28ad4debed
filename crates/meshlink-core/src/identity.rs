//! Node identity: seed persistence and key derivation
//!
//! A node's identity is a 32-byte secret seed stored as a raw file with
//! owner-only permissions. The seed is created once and loaded on every
//! subsequent start; an existing file of the wrong length is a fatal
//! startup error, never silently regenerated.

use std::fs;
use std::path::Path;

use ed25519_dalek::SigningKey;
use tracing::info;

use crate::error::MeshError;

/// Length of the identity seed in bytes
pub const SEED_LEN: usize = 32;

/// Generate a cryptographically random 32-byte seed
pub fn generate_seed() -> Result<[u8; SEED_LEN], MeshError> {
    let mut seed = [0u8; SEED_LEN];
    getrandom::getrandom(&mut seed)
        .map_err(|e| MeshError::Identity(format!("failed to gather entropy: {}", e)))?;
    Ok(seed)
}

/// Load an existing seed or generate and persist a new one
///
/// The parent directory is created if needed. A newly written seed file is
/// restricted to owner read/write on unix.
///
/// # Errors
///
/// Returns `MeshError::Identity` if an existing file is not exactly
/// 32 bytes. This is fatal: a truncated seed would silently change the
/// node's keys.
pub fn load_or_create_seed(path: impl AsRef<Path>) -> Result<[u8; SEED_LEN], MeshError> {
    let path = path.as_ref();

    if path.exists() {
        let bytes = fs::read(path)?;
        let seed: [u8; SEED_LEN] = bytes.as_slice().try_into().map_err(|_| {
            MeshError::Identity(format!(
                "identity seed must be {} bytes, got {}",
                SEED_LEN,
                bytes.len()
            ))
        })?;
        info!(?path, "Loaded existing identity seed");
        return Ok(seed);
    }

    info!(?path, "No identity found, generating new seed");
    let seed = generate_seed()?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, seed)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }
    Ok(seed)
}

/// The node's identity keypair, derived from the persistent seed
///
/// Immutable for the process lifetime.
#[derive(Clone)]
pub struct NodeIdentity {
    signing: SigningKey,
}

impl NodeIdentity {
    /// Derive the identity from a 32-byte seed
    pub fn from_seed(seed: &[u8; SEED_LEN]) -> Self {
        Self {
            signing: SigningKey::from_bytes(seed),
        }
    }

    /// Public key bytes
    pub fn public_key(&self) -> [u8; 32] {
        self.signing.verifying_key().to_bytes()
    }

    /// Public key as lowercase hex
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key())
    }

    /// First byte of the public key, as carried in packet source hashes
    pub fn source_hash(&self) -> u8 {
        self.public_key()[0]
    }

    /// Short display form: first and last 8 hex chars of the public key
    pub fn summary(&self) -> String {
        let full = self.public_key_hex();
        format!("{}…{}", &full[..8], &full[full.len() - 8..])
    }

    /// Access the signing key for handing into the protocol engine
    pub fn signing_key(&self) -> &SigningKey {
        &self.signing
    }
}

impl std::fmt::Debug for NodeIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeIdentity")
            .field("public_key", &self.public_key_hex())
            .finish()
    }
}
