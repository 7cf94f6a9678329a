//! Local key store backends: where the identity record and peer directory live.
//!
//! Pure persistence, no cryptography. Failures surface immediately as
//! [`StoreError::Unavailable`]; nothing is retried.

use crate::error::StoreError;
use crate::types::{PeerId, StoredIdentity};

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

/// Fixed, versionless storage key for the identity record.
pub const IDENTITY_KEY: &str = "e2ee-identity";
/// Fixed, versionless storage key for the peer public-key directory.
pub const PEER_DIRECTORY_KEY: &str = "e2ee-peer-keys";

/// Peer id → portable public-key encoding. Last write wins.
pub type PeerDirectory = BTreeMap<PeerId, String>;

// ---------------------------------------------------------------------------
// Storage trait
// ---------------------------------------------------------------------------

/// Durable client-side storage for the session's key material.
///
/// Implementations must make each save either fully visible or not at all.
pub trait LocalKeyStore: Send + Sync {
    fn load_identity(&self) -> Result<Option<StoredIdentity>, StoreError>;
    fn save_identity(&self, identity: &StoredIdentity) -> Result<(), StoreError>;
    fn load_peer_directory(&self) -> Result<PeerDirectory, StoreError>;
    fn save_peer_entry(&self, peer: &PeerId, public_key: &str) -> Result<(), StoreError>;
    fn clear_all(&self) -> Result<(), StoreError>;
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Unavailable("lock poisoned".into())
}

// ---------------------------------------------------------------------------
// In-memory backend
// ---------------------------------------------------------------------------

/// In-memory storage (tests, and sessions that must not touch disk).
#[derive(Default)]
pub struct InMemoryKeyStore {
    identity: RwLock<Option<StoredIdentity>>,
    peers: RwLock<PeerDirectory>,
}

impl InMemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalKeyStore for InMemoryKeyStore {
    fn load_identity(&self) -> Result<Option<StoredIdentity>, StoreError> {
        Ok(self.identity.read().map_err(poisoned)?.clone())
    }

    fn save_identity(&self, identity: &StoredIdentity) -> Result<(), StoreError> {
        *self.identity.write().map_err(poisoned)? = Some(identity.clone());
        Ok(())
    }

    fn load_peer_directory(&self) -> Result<PeerDirectory, StoreError> {
        Ok(self.peers.read().map_err(poisoned)?.clone())
    }

    fn save_peer_entry(&self, peer: &PeerId, public_key: &str) -> Result<(), StoreError> {
        self.peers
            .write()
            .map_err(poisoned)?
            .insert(peer.clone(), public_key.to_string());
        Ok(())
    }

    fn clear_all(&self) -> Result<(), StoreError> {
        *self.identity.write().map_err(poisoned)? = None;
        self.peers.write().map_err(poisoned)?.clear();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// File backend
// ---------------------------------------------------------------------------

/// File-based storage (one JSON file per storage key).
///
/// Directory layout:
/// ```text
/// data/
///   e2ee-identity.json
///   e2ee-peer-keys.json
/// ```
pub struct FileKeyStore {
    dir: PathBuf,
    writer: Mutex<()>,
}

impl FileKeyStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .map_err(|e| StoreError::Unavailable(format!("create dir: {}", e)))?;
        Ok(Self {
            dir,
            writer: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    fn read_json<T: serde::de::DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let data = std::fs::read_to_string(&path)
            .map_err(|e| StoreError::Unavailable(format!("read {}: {}", key, e)))?;
        serde_json::from_str(&data)
            .map(Some)
            .map_err(|e| StoreError::Unavailable(format!("parse {}: {}", key, e)))
    }

    fn write_json<T: serde::Serialize>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let path = self.path_for(key);
        let json = serde_json::to_string_pretty(value)
            .map_err(|e| StoreError::Unavailable(format!("serialize {}: {}", key, e)))?;
        // Atomic write: write to temp, then rename
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, &json)
            .map_err(|e| StoreError::Unavailable(format!("write {}: {}", key, e)))?;
        std::fs::rename(&tmp, &path)
            .map_err(|e| StoreError::Unavailable(format!("rename {}: {}", key, e)))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let path = self.path_for(key);
        if path.exists() {
            std::fs::remove_file(&path)
                .map_err(|e| StoreError::Unavailable(format!("delete {}: {}", key, e)))?;
        }
        Ok(())
    }
}

impl LocalKeyStore for FileKeyStore {
    fn load_identity(&self) -> Result<Option<StoredIdentity>, StoreError> {
        self.read_json(IDENTITY_KEY)
    }

    fn save_identity(&self, identity: &StoredIdentity) -> Result<(), StoreError> {
        let _guard = self.writer.lock().map_err(poisoned)?;
        self.write_json(IDENTITY_KEY, identity)
    }

    fn load_peer_directory(&self) -> Result<PeerDirectory, StoreError> {
        Ok(self.read_json(PEER_DIRECTORY_KEY)?.unwrap_or_default())
    }

    fn save_peer_entry(&self, peer: &PeerId, public_key: &str) -> Result<(), StoreError> {
        let _guard = self.writer.lock().map_err(poisoned)?;
        let mut peers: PeerDirectory = self.read_json(PEER_DIRECTORY_KEY)?.unwrap_or_default();
        peers.insert(peer.clone(), public_key.to_string());
        self.write_json(PEER_DIRECTORY_KEY, &peers)
    }

    fn clear_all(&self) -> Result<(), StoreError> {
        let _guard = self.writer.lock().map_err(poisoned)?;
        self.remove(IDENTITY_KEY)?;
        self.remove(PEER_DIRECTORY_KEY)
    }
}
