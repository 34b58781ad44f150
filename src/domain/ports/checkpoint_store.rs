//! Checkpoint store port.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::Checkpoint;

/// Keyed persistence for loop snapshots.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Load the snapshot for `key`, or `None` if nothing was saved.
    async fn load(&self, key: &str) -> DomainResult<Option<Checkpoint>>;

    /// Replace the snapshot for `key`.
    async fn save(&self, key: &str, checkpoint: &Checkpoint) -> DomainResult<()>;

    /// Remove the snapshot for `key`. Removing a missing key is not an error.
    async fn clear(&self, key: &str) -> DomainResult<()>;
}
