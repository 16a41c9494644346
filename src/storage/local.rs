//! Local filesystem storage implementation.
//!
//! Each entity lives in its own JSON file under `{root}/{kind}/{index}.json`
//! and is replaced atomically on every save.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::{Entity, ResourceKind};
use crate::storage::{ScheduleStore, StoredEntity};

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Relative key of an entity file.
    fn entity_key(kind: ResourceKind, index: i64) -> String {
        format!("{}/{}.json", kind.as_str(), index)
    }

    /// Get the full path for a relative key.
    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        self.ensure_dir(&path).await?;

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(key, &bytes).await
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(self.path(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.read_bytes(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Stored envelope of an entity, including its write time.
    pub async fn load_stored(&self, kind: ResourceKind, index: i64) -> Result<Option<StoredEntity>> {
        self.read_json(&Self::entity_key(kind, index)).await
    }
}

#[async_trait]
impl ScheduleStore for LocalStorage {
    async fn save(&self, entity: &Entity) -> Result<()> {
        let key = Self::entity_key(entity.kind(), entity.index());
        self.write_json(&key, &StoredEntity::new(entity.clone())).await?;
        log::debug!("Saved {} to {}", entity.store_key(), key);
        Ok(())
    }

    async fn delete(&self, kind: ResourceKind, index: i64) -> Result<()> {
        match tokio::fs::remove_file(self.path(&Self::entity_key(kind, index))).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    async fn load(&self, kind: ResourceKind, index: i64) -> Result<Option<Entity>> {
        Ok(self
            .load_stored(kind, index)
            .await?
            .map(|stored| stored.entity))
    }
}
