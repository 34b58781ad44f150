//! JSON-file checkpoint store.
//!
//! One file per key, `{dir}/{key}.json`, replaced atomically on every save.

use async_trait::async_trait;
use std::fmt::Write as _;
use std::path::PathBuf;
use tokio::fs;
use tracing::debug;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::Checkpoint;
use crate::domain::ports::CheckpointStore;

pub struct FileCheckpointStore {
    dir: PathBuf,
}

impl FileCheckpointStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path for `key`. Bytes outside `[A-Za-z0-9_-]` are written as `%XX`,
    /// so distinct keys get distinct files and none can escape the directory.
    pub fn path_for(&self, key: &str) -> PathBuf {
        let mut safe = String::with_capacity(key.len());
        for byte in key.bytes() {
            if byte.is_ascii_alphanumeric() || matches!(byte, b'_' | b'-') {
                safe.push(char::from(byte));
            } else {
                let _ = write!(safe, "%{byte:02X}");
            }
        }
        self.dir.join(format!("{safe}.json"))
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn load(&self, key: &str) -> DomainResult<Option<Checkpoint>> {
        let path = self.path_for(key);
        let json = match fs::read_to_string(&path).await {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(DomainError::Checkpoint(format!(
                    "Failed to read {}: {e}",
                    path.display()
                )))
            }
        };
        let checkpoint = serde_json::from_str(&json).map_err(|e| {
            DomainError::Checkpoint(format!("Failed to deserialize {}: {e}", path.display()))
        })?;
        Ok(Some(checkpoint))
    }

    async fn save(&self, key: &str, checkpoint: &Checkpoint) -> DomainResult<()> {
        fs::create_dir_all(&self.dir).await.map_err(|e| {
            DomainError::Checkpoint(format!("Failed to create {}: {e}", self.dir.display()))
        })?;

        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(checkpoint)?;

        fs::write(&tmp, json)
            .await
            .map_err(|e| DomainError::Checkpoint(format!("Failed to write {}: {e}", tmp.display())))?;
        fs::rename(&tmp, &path)
            .await
            .map_err(|e| DomainError::Checkpoint(format!("Failed to replace {}: {e}", path.display())))?;

        debug!(path = %path.display(), round = checkpoint.round, phase = %checkpoint.phase, "checkpoint saved");
        Ok(())
    }

    async fn clear(&self, key: &str) -> DomainResult<()> {
        match fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(DomainError::Checkpoint(format!("Failed to remove checkpoint: {e}"))),
        }
    }
}
