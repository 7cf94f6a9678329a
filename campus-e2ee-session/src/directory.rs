//! Key-directory collaborator: where users publish and look up public keys.
//!
//! The session trusts whatever the directory returns.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::RwLock;

use crate::error::DirectoryError;
use crate::types::PeerId;

/// Backend for public-key lookup and publication.
///
/// Implement this over the application's REST API. Absent keys are
/// `Ok(None)`, not errors.
#[async_trait]
pub trait KeyDirectory: Send + Sync {
    async fn lookup(&self, user: &PeerId) -> Result<Option<String>, DirectoryError>;
    async fn publish(&self, user: &PeerId, public_key: &str) -> Result<(), DirectoryError>;
}

// ---------------------------------------------------------------------------
// In-memory directory
// ---------------------------------------------------------------------------

/// Shared in-process directory (tests, single-process demos).
#[derive(Default)]
pub struct InMemoryKeyDirectory {
    keys: RwLock<HashMap<PeerId, String>>,
}

impl InMemoryKeyDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.keys.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.keys.read().await.is_empty()
    }
}

#[async_trait]
impl KeyDirectory for InMemoryKeyDirectory {
    async fn lookup(&self, user: &PeerId) -> Result<Option<String>, DirectoryError> {
        Ok(self.keys.read().await.get(user).cloned())
    }

    async fn publish(&self, user: &PeerId, public_key: &str) -> Result<(), DirectoryError> {
        self.keys
            .write()
            .await
            .insert(user.clone(), public_key.to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// File directory
// ---------------------------------------------------------------------------

/// Directory of `<user>.pub` files, shared between local sessions.
///
/// ```text
/// directory/
///   alice.pub
///   bob.pub
/// ```
pub struct FileKeyDirectory {
    dir: PathBuf,
}

impl FileKeyDirectory {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, DirectoryError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .map_err(|e| DirectoryError::Unreachable(format!("create dir: {}", e)))?;
        Ok(Self { dir })
    }

    fn path_for(&self, user: &PeerId) -> Result<PathBuf, DirectoryError> {
        let name = user.as_str();
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
            && !name.starts_with('.');
        if !valid {
            return Err(DirectoryError::Rejected(format!("invalid user id: {:?}", name)));
        }
        Ok(self.dir.join(format!("{}.pub", name)))
    }
}

#[async_trait]
impl KeyDirectory for FileKeyDirectory {
    async fn lookup(&self, user: &PeerId) -> Result<Option<String>, DirectoryError> {
        let path = self.path_for(user)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(s) => Ok(Some(s.trim().to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(DirectoryError::Unreachable(format!("read: {}", e))),
        }
    }

    async fn publish(&self, user: &PeerId, public_key: &str) -> Result<(), DirectoryError> {
        let path = self.path_for(user)?;
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, public_key)
            .await
            .map_err(|e| DirectoryError::Unreachable(format!("write: {}", e)))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| DirectoryError::Unreachable(format!("rename: {}", e)))
    }
}
