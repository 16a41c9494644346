//! In-memory storage backend.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Entity, ResourceKind};
use crate::storage::ScheduleStore;

/// Keeps entities in a map keyed by `"<type>:<index>"`.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entities: Mutex<HashMap<String, Entity>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn entities(&self) -> MutexGuard<'_, HashMap<String, Entity>> {
        self.entities.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.entities().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities().is_empty()
    }

    /// Sorted keys of everything stored.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entities().keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl ScheduleStore for MemoryStorage {
    async fn save(&self, entity: &Entity) -> Result<()> {
        self.entities().insert(entity.store_key(), entity.clone());
        Ok(())
    }

    async fn delete(&self, kind: ResourceKind, index: i64) -> Result<()> {
        self.entities().remove(&kind.store_key(index));
        Ok(())
    }

    async fn load(&self, kind: ResourceKind, index: i64) -> Result<Option<Entity>> {
        Ok(self.entities().get(&kind.store_key(index)).cloned())
    }
}
