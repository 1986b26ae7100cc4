//! Persisted client-side key-value slots for the access token

use crate::error::{CoreError, CoreResult, ErrorContext};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::debug;

/// Default slot name for the access token
pub const AUTH_TOKEN_KEY: &str = "auth_token";

/// Key-value storage surviving restarts of the client
#[async_trait]
pub trait TokenStorage: Send + Sync {
    async fn get(&self, key: &str) -> CoreResult<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> CoreResult<()>;
    async fn remove(&self, key: &str) -> CoreResult<()>;
}

/// In-process storage, lost on exit
#[derive(Debug, Default)]
pub struct MemoryTokenStorage {
    slots: RwLock<HashMap<String, String>>,
}

impl MemoryTokenStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStorage for MemoryTokenStorage {
    async fn get(&self, key: &str) -> CoreResult<Option<String>> {
        Ok(self.slots.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> CoreResult<()> {
        self.slots
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> CoreResult<()> {
        self.slots.write().await.remove(key);
        Ok(())
    }
}

/// JSON file holding all slots, rewritten on every change
#[derive(Debug)]
pub struct FileTokenStorage {
    path: PathBuf,
    lock: RwLock<()>,
}

impl FileTokenStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: RwLock::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> CoreResult<HashMap<String, String>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(HashMap::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e)
                .with_context(|| format!("reading {}", self.path.display()))
                .map_err(CoreError::io_error),
        }
    }

    async fn save(&self, slots: &HashMap<String, String>) -> CoreResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating {}", parent.display()))
                .map_err(CoreError::io_error)?;
        }
        let bytes = serde_json::to_vec_pretty(slots)?;
        tokio::fs::write(&self.path, bytes)
            .await
            .with_context(|| format!("writing {}", self.path.display()))
            .map_err(CoreError::io_error)?;
        debug!(path = %self.path.display(), slots = slots.len(), "Saved token storage");
        Ok(())
    }
}

#[async_trait]
impl TokenStorage for FileTokenStorage {
    async fn get(&self, key: &str) -> CoreResult<Option<String>> {
        let _guard = self.lock.read().await;
        Ok(self.load().await?.remove(key))
    }

    async fn set(&self, key: &str, value: &str) -> CoreResult<()> {
        let _guard = self.lock.write().await;
        let mut slots = self.load().await?;
        slots.insert(key.to_string(), value.to_string());
        self.save(&slots).await
    }

    async fn remove(&self, key: &str) -> CoreResult<()> {
        let _guard = self.lock.write().await;
        let mut slots = self.load().await?;
        if slots.remove(key).is_some() {
            self.save(&slots).await?;
        }
        Ok(())
    }
}
