//! Snapshot store abstraction.

use async_trait::async_trait;
use roadmap_core::{CycleId, Snapshot, Time};
use serde::{Deserialize, Serialize};

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Item not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Bookkeeping written next to each persisted snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotMeta {
    /// Number of snapshots written so far
    pub version: u64,

    /// When the latest one was written
    pub updated_at: Time,

    /// Cycle that produced it
    pub cycle_id: Option<CycleId>,
}

/// Durable home of the latest published snapshot.
///
/// Implementations must never expose a partially written snapshot: a
/// concurrent or interrupted save leaves the previous one loadable.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Persist a snapshot, replacing the previous one.
    async fn save_snapshot(&self, snapshot: &Snapshot) -> Result<()>;

    /// Load the latest snapshot, if one was ever saved.
    async fn load_snapshot(&self) -> Result<Option<Snapshot>>;

    /// Bookkeeping for the latest snapshot.
    async fn load_meta(&self) -> Result<Option<SnapshotMeta>>;
}
