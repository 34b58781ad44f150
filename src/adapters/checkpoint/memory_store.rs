//! In-memory checkpoint store, for tests and single-process runs.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::domain::errors::DomainResult;
use crate::domain::models::Checkpoint;
use crate::domain::ports::CheckpointStore;

#[derive(Default)]
pub struct InMemoryCheckpointStore {
    checkpoints: RwLock<HashMap<String, Checkpoint>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys with a stored checkpoint.
    pub async fn len(&self) -> usize {
        self.checkpoints.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.checkpoints.read().await.is_empty()
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn load(&self, key: &str) -> DomainResult<Option<Checkpoint>> {
        Ok(self.checkpoints.read().await.get(key).cloned())
    }

    async fn save(&self, key: &str, checkpoint: &Checkpoint) -> DomainResult<()> {
        self.checkpoints
            .write()
            .await
            .insert(key.to_string(), checkpoint.clone());
        Ok(())
    }

    async fn clear(&self, key: &str) -> DomainResult<()> {
        self.checkpoints.write().await.remove(key);
        Ok(())
    }
}
