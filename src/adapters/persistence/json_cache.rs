//! Implements ChatCache using one JSON file per VOD.
//!
//! Artifact: `{output_dir}/{vod_id}_chat.json`, a pretty-printed array of ChatMessage.
//! Its presence alone marks the chat as downloaded.

use crate::domain::{ChatMessage, DomainError, VodId};
use crate::ports::ChatCache;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

pub struct JsonChatCache {
    base_dir: PathBuf,
}

impl JsonChatCache {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    /// Unique sibling of `path`, so concurrent writers never share a temp file.
    fn temp_path(path: &Path) -> PathBuf {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        path.with_file_name(format!(
            "{}.{}-{:08x}.tmp",
            name,
            std::process::id(),
            rand::random::<u32>()
        ))
    }

    /// Write-replace: temp file, fsync, rename over the final path.
    /// The temp file is removed on any failure.
    async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), DomainError> {
        let temp_path = Self::temp_path(path);
        let result = Self::write_and_rename(&temp_path, path, bytes).await;
        if result.is_err() {
            let _ = fs::remove_file(&temp_path).await;
        }
        result
    }

    async fn write_and_rename(
        temp_path: &Path,
        path: &Path,
        bytes: &[u8],
    ) -> Result<(), DomainError> {
        let mut f = fs::File::create(temp_path)
            .await
            .map_err(|e| DomainError::Cache(format!("create temp file: {}", e)))?;
        f.write_all(bytes)
            .await
            .map_err(|e| DomainError::Cache(format!("write temp file: {}", e)))?;
        f.sync_all()
            .await
            .map_err(|e| DomainError::Cache(format!("sync temp file: {}", e)))?;
        drop(f);

        fs::rename(temp_path, path)
            .await
            .map_err(|e| DomainError::Cache(format!("atomic rename failed: {}", e)))
    }
}

#[async_trait::async_trait]
impl ChatCache for JsonChatCache {
    fn artifact_path(&self, vod_id: &VodId) -> PathBuf {
        self.base_dir.join(format!("{}_chat.json", vod_id))
    }

    async fn exists(&self, vod_id: &VodId) -> Result<bool, DomainError> {
        fs::try_exists(self.artifact_path(vod_id))
            .await
            .map_err(|e| DomainError::Cache(e.to_string()))
    }

    async fn load(&self, vod_id: &VodId) -> Result<Vec<ChatMessage>, DomainError> {
        let path = self.artifact_path(vod_id);
        let raw = fs::read_to_string(&path)
            .await
            .map_err(|e| DomainError::Cache(format!("read {}: {}", path.display(), e)))?;
        serde_json::from_str(&raw)
            .map_err(|e| DomainError::Cache(format!("parse {}: {}", path.display(), e)))
    }

    async fn persist(&self, vod_id: &VodId, messages: &[ChatMessage]) -> Result<(), DomainError> {
        fs::create_dir_all(&self.base_dir)
            .await
            .map_err(|e| DomainError::Cache(e.to_string()))?;
        let path = self.artifact_path(vod_id);
        let json =
            serde_json::to_vec_pretty(messages).map_err(|e| DomainError::Cache(e.to_string()))?;

        Self::write_atomic(&path, &json).await?;

        debug!(path = %path.display(), count = messages.len(), "chat saved to cache");
        info!(vod_id = %vod_id, count = messages.len(), "chat artifact written");
        Ok(())
    }
}
