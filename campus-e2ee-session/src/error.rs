//! Error types for the session layer.

use campus_e2ee::CryptoError;
use thiserror::Error;

use crate::types::PeerId;

// ---------------------------------------------------------------------------
// Collaborator errors
// ---------------------------------------------------------------------------

/// Local key store failure. Never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Key-directory collaborator failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectoryError {
    #[error("directory unreachable: {0}")]
    Unreachable(String),
    #[error("directory rejected request: {0}")]
    Rejected(String),
}

// ---------------------------------------------------------------------------
// Top-level session error
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session not initialized")]
    NotInitialized,

    /// Only returned under `RecoveryPolicy::Strict`.
    #[error("wrong password for stored identity")]
    WrongPassword,

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("no shared key with {peer}")]
    NoSharedKey { peer: PeerId },

    /// Only returned under `PeerKeyChangePolicy::Reject`.
    #[error("public key for {peer} changed")]
    PeerKeyChanged { peer: PeerId },

    #[error("key directory: {0}")]
    Directory(#[from] DirectoryError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("background task failed: {0}")]
    Task(String),
}

impl From<StoreError> for SessionError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Unavailable(msg) => Self::StorageUnavailable(msg),
        }
    }
}
