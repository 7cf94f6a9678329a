//! # Campus E2EE Session
//!
//! Per-user encryption session for campus chat.
//!
//! Owns the identity lifecycle (restore, generate, publish, clear), lazy
//! per-peer key exchange, and plaintext-tolerant message encryption, over
//! pluggable local storage and key-directory backends.
//!
//! Built on top of `campus-e2ee` for X25519 + AES-256-GCM.
//!
//! ## Quick Start
//!
//! ```no_run
//! use campus_e2ee_session::*;
//! use std::sync::Arc;
//!
//! # async fn demo() -> Result<(), SessionError> {
//! let directory = Arc::new(InMemoryKeyDirectory::new());
//! let alice = SessionManager::new("alice", Arc::new(InMemoryKeyStore::new()), directory.clone());
//! let bob = SessionManager::new("bob", Arc::new(InMemoryKeyStore::new()), directory);
//!
//! alice.initialize("p1").await?;
//! bob.initialize("p2").await?;
//!
//! // Lazy exchange: alice looks bob up in the directory on first send
//! let wire = alice.encrypt_for_user(&PeerId::new("bob"), "hello").await?;
//! assert_eq!(bob.decrypt_from_user(&PeerId::new("alice"), &wire).await?, "hello");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod directory;
pub mod error;
pub mod events;
pub mod session;
pub mod storage;
pub mod types;

// Re-export main types for convenience
pub use config::{FallbackPolicy, PeerKeyChangePolicy, RecoveryPolicy, SessionConfig};
pub use directory::{FileKeyDirectory, InMemoryKeyDirectory, KeyDirectory};
pub use error::{DirectoryError, SessionError, StoreError};
pub use events::{EventSink, InMemoryEventSink, SessionAction, SessionEvent, TracingEventSink};
pub use session::SessionManager;
pub use storage::{FileKeyStore, InMemoryKeyStore, LocalKeyStore, PeerDirectory};
pub use types::{InitOutcome, KeyExchange, PeerId, SessionState, StoredIdentity};

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use campus_e2ee::KdfParams;
    use std::sync::Arc;

    fn fast() -> SessionConfig {
        SessionConfig::default().with_kdf(KdfParams::with_iterations(1_000))
    }

    fn pair_with_directory() -> (SessionManager, SessionManager, Arc<InMemoryKeyDirectory>) {
        let directory = Arc::new(InMemoryKeyDirectory::new());
        let a = SessionManager::new("alice", Arc::new(InMemoryKeyStore::new()), directory.clone())
            .with_config(fast());
        let b = SessionManager::new("bob", Arc::new(InMemoryKeyStore::new()), directory.clone())
            .with_config(fast());
        (a, b, directory)
    }

    #[tokio::test]
    async fn lazy_exchange_on_first_send() {
        let (a, b, _) = pair_with_directory();
        a.initialize("p1").await.unwrap();
        b.initialize("p2").await.unwrap();

        let bob = PeerId::new("bob");
        let alice = PeerId::new("alice");
        assert!(!a.has_shared_key(&bob));

        let wire = a.encrypt_for_user(&bob, "hello").await.unwrap();
        assert_ne!(wire, "hello");
        assert!(campus_e2ee::wire::is_encrypted(&wire));
        assert!(a.has_shared_key(&bob));

        // Bob resolves Alice from the directory on receipt
        assert_eq!(b.decrypt_from_user(&alice, &wire).await.unwrap(), "hello");
        assert!(b.has_shared_key(&alice));
    }

    #[tokio::test]
    async fn replies_flow_both_ways() {
        let (a, b, _) = pair_with_directory();
        a.initialize("p1").await.unwrap();
        b.initialize("p2").await.unwrap();
        let bob = PeerId::new("bob");
        let alice = PeerId::new("alice");

        for i in 0..5 {
            let msg = format!("message {}", i);
            let to_b = a.encrypt_for_user(&bob, &msg).await.unwrap();
            assert_eq!(b.decrypt_from_user(&alice, &to_b).await.unwrap(), msg);
            let to_a = b.encrypt_for_user(&alice, &msg).await.unwrap();
            assert_eq!(a.decrypt_from_user(&bob, &to_a).await.unwrap(), msg);
        }
    }

    #[tokio::test]
    async fn unknown_peer_degrades_to_plaintext() {
        let (a, _, _) = pair_with_directory();
        a.initialize("p1").await.unwrap();
        let out = a.encrypt_for_user(&PeerId::new("carol"), "hi").await.unwrap();
        assert_eq!(out, "hi");
    }

    #[tokio::test]
    async fn concurrent_initialize_yields_one_identity() {
        let directory = Arc::new(InMemoryKeyDirectory::new());
        let s = Arc::new(
            SessionManager::new("alice", Arc::new(InMemoryKeyStore::new()), directory).with_config(fast()),
        );

        let mut handles = Vec::new();
        for _ in 0..4 {
            let s = s.clone();
            handles.push(tokio::spawn(async move { s.initialize("p1").await.unwrap() }));
        }
        let mut outcomes = Vec::new();
        for h in handles {
            outcomes.push(h.await.unwrap());
        }

        assert_eq!(outcomes.iter().filter(|o| **o == InitOutcome::Generated).count(), 1);
        assert_eq!(outcomes.iter().filter(|o| **o == InitOutcome::AlreadyReady).count(), 3);
    }
}
