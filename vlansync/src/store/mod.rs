//! Persisted VLAN inventory.
//!
//! The store is a queryable mirror of the device. Every batch call is
//! atomic: it either applies to all given keys or to none of them.

mod sqlite;

pub use sqlite::SqliteStore;

use async_trait::async_trait;
use thiserror::Error;

use crate::record::{ValidationError, VlanRecord};

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("invalid record: {0}")]
    Invalid(#[from] ValidationError),

    /// Create of a key that is already stored.
    #[error("vlan {0} already exists")]
    AlreadyExists(u16),

    /// Update or delete of a key that is not stored.
    #[error("vlan {0} not found")]
    NotFound(u16),

    /// Row that does not decode into a VlanRecord.
    #[error("corrupt row: vlan_id {0}")]
    CorruptRow(i64),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Durable VLAN collection keyed by `vlan_id`.
#[async_trait]
pub trait PersistedStore: Send + Sync {
    /// All records, ordered by `vlan_id`.
    async fn list(&self) -> Result<Vec<VlanRecord>>;

    async fn get(&self, vlan_id: u16) -> Result<Option<VlanRecord>>;

    /// Insert new records. Fails the whole batch if any key exists.
    async fn create(&self, records: &[VlanRecord]) -> Result<()>;

    /// Overwrite name and description of existing records.
    async fn update(&self, records: &[VlanRecord]) -> Result<()>;

    /// Remove the given keys. Fails the whole batch if any key is missing.
    async fn delete(&self, vlan_ids: &[u16]) -> Result<()>;
}
