//! Outbound ports. Application calls into infrastructure.
//!
//! Implemented by adapters.

use crate::domain::{ChatMessage, DomainError, FetchError, Page, VodId, VodInfo};
use std::path::{Path, PathBuf};

/// Chat endpoint. One call = one network request = one page.
#[async_trait::async_trait]
pub trait ChatPageSource: Send + Sync {
    /// Fetch the page of chat starting at `offset` seconds into the VOD.
    ///
    /// Implementations must not retry; failures are classified and returned.
    async fn fetch_page(&self, vod_id: &VodId, offset: u64) -> Result<Page, FetchError>;
}

/// Chat artifact storage. Presence of an artifact is the only completion marker.
#[async_trait::async_trait]
pub trait ChatCache: Send + Sync {
    /// Where the artifact for `vod_id` lives (or would live).
    fn artifact_path(&self, vod_id: &VodId) -> PathBuf;

    /// Existence check only; contents are not validated.
    async fn exists(&self, vod_id: &VodId) -> Result<bool, DomainError>;

    async fn load(&self, vod_id: &VodId) -> Result<Vec<ChatMessage>, DomainError>;

    /// Persist atomically: readers never see a partially written artifact.
    async fn persist(&self, vod_id: &VodId, messages: &[ChatMessage]) -> Result<(), DomainError>;
}

/// VOD metadata provider (Helix).
#[async_trait::async_trait]
pub trait VodCatalog: Send + Sync {
    /// Most recent archived stream of `channel` (login name).
    async fn get_latest_vod(&self, channel: &str) -> Result<VodInfo, DomainError>;

    async fn get_vod_metadata(&self, vod_id: &VodId) -> Result<VodInfo, DomainError>;
}

/// External video download tool.
#[async_trait::async_trait]
pub trait VideoDownloaderPort: Send + Sync {
    /// Download the VOD video to `dest`. `quality` is a preset name or a raw format string.
    async fn download(&self, vod_id: &VodId, quality: &str, dest: &Path)
    -> Result<(), DomainError>;
}
