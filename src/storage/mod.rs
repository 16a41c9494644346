//! Persistence of scraped timetable entities.
//!
//! ## Directory Structure
//!
//! ```text
//! storage/
//! ├── config.toml
//! ├── division/
//! │   ├── 1.json
//! │   └── 2.json
//! ├── teacher/
//! │   └── 7.json
//! └── room/
//!     └── 4.json
//! ```

pub mod local;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{Entity, ResourceKind};

pub use local::LocalStorage;
pub use memory::MemoryStorage;

/// On-disk envelope for a persisted entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredEntity {
    /// ISO 8601 timestamp of the last write
    pub updated_at: DateTime<Utc>,
    pub entity: Entity,
}

impl StoredEntity {
    pub fn new(entity: Entity) -> Self {
        Self {
            updated_at: Utc::now(),
            entity,
        }
    }
}

/// Trait for entity storage backends.
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    /// Create or wholesale overwrite an entity.
    async fn save(&self, entity: &Entity) -> Result<()>;

    /// Delete an entity; deleting a missing one is not an error.
    async fn delete(&self, kind: ResourceKind, index: i64) -> Result<()>;

    /// Load an entity, `None` if it was never stored.
    async fn load(&self, kind: ResourceKind, index: i64) -> Result<Option<Entity>>;
}
