//! Core types: PeerId, StoredIdentity, SessionState, outcomes.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// A chat user's identifier, as assigned by the application backend.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PeerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// ---------------------------------------------------------------------------
// Persisted identity
// ---------------------------------------------------------------------------

/// Persisted form of the local key pair. Replaced wholesale, never patched.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredIdentity {
    /// Portable public-key encoding.
    pub public_key: String,
    /// Password-wrapped private key blob.
    pub encrypted_private_key: String,
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

/// Session lifecycle.
///
/// ```text
/// UNINITIALIZED → INITIALIZING → READY
///       ↑                          │
///       └──────── clear_keys ──────┘
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Initializing,
    Ready,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Uninitialized => write!(f, "UNINITIALIZED"),
            SessionState::Initializing => write!(f, "INITIALIZING"),
            SessionState::Ready => write!(f, "READY"),
        }
    }
}

/// How `initialize` arrived at the ready identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InitOutcome {
    /// Stored identity unwrapped with the given password.
    Restored,
    /// No stored identity; a new one was created.
    Generated,
    /// Stored identity could not be unwrapped and was replaced.
    Regenerated,
    /// Another call already initialized this session.
    AlreadyReady,
}

/// Result of `exchange_keys`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeyExchange {
    /// First shared key with this peer in this session.
    Established,
    /// Same peer key as before; nothing changed.
    Unchanged,
    /// The peer presented a different key than the one on record.
    Rekeyed {
        previous_fingerprint: String,
        current_fingerprint: String,
    },
}
