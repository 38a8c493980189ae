//! VOD facade: metadata, video and chat behind one entry point.
//!
//! Video uses the same skip-if-present gate as chat, plus a size threshold so a
//! failed partial download is not mistaken for a finished one.

use crate::domain::{ChatTranscript, DomainError, VodId, VodInfo};
use crate::ports::{VideoDownloaderPort, VodCatalog};
use crate::usecases::ChatService;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Cached videos at or below this size are downloaded again.
const MIN_VALID_VIDEO_SIZE: u64 = 1024 * 1024;

pub struct VodService {
    catalog: Option<Arc<dyn VodCatalog>>,
    video: Arc<dyn VideoDownloaderPort>,
    chat: Arc<ChatService>,
    output_dir: PathBuf,
    default_quality: String,
}

impl VodService {
    pub fn new(
        catalog: Option<Arc<dyn VodCatalog>>,
        video: Arc<dyn VideoDownloaderPort>,
        chat: Arc<ChatService>,
        output_dir: impl AsRef<Path>,
        default_quality: impl Into<String>,
    ) -> Self {
        Self {
            catalog,
            video,
            chat,
            output_dir: output_dir.as_ref().to_path_buf(),
            default_quality: default_quality.into(),
        }
    }

    fn catalog(&self) -> Result<&Arc<dyn VodCatalog>, DomainError> {
        self.catalog.as_ref().ok_or_else(|| {
            DomainError::Config(
                "set TWITCH_CLIENT_ID and TWITCH_CLIENT_SECRET for VOD metadata".into(),
            )
        })
    }

    pub fn video_path(&self, vod_id: &VodId) -> PathBuf {
        self.output_dir.join(format!("{}.mp4", vod_id))
    }

    pub fn default_quality(&self) -> &str {
        &self.default_quality
    }

    pub fn chat_path(&self, vod_id: &VodId) -> PathBuf {
        self.chat.artifact_path(vod_id)
    }

    pub async fn latest_vod(&self, channel: &str) -> Result<VodInfo, DomainError> {
        info!(channel, "fetching latest VOD");
        let vod = self.catalog()?.get_latest_vod(channel).await?;
        let title: String = vod.title.chars().take(60).collect();
        info!(vod_id = %vod.id, title = %title, duration_s = vod.duration_secs, "latest VOD found");
        Ok(vod)
    }

    pub async fn vod_metadata(&self, vod_id: &VodId) -> Result<VodInfo, DomainError> {
        info!(vod_id = %vod_id, "fetching VOD metadata");
        self.catalog()?.get_vod_metadata(vod_id).await
    }

    /// Download the video unless a large enough file is already there.
    pub async fn download_video(
        &self,
        vod_id: &VodId,
        quality: Option<&str>,
    ) -> Result<PathBuf, DomainError> {
        let path = self.video_path(vod_id);
        if is_cached_video(&path).await {
            info!(vod_id = %vod_id, path = %path.display(), "VOD already downloaded, skipping");
            return Ok(path);
        }

        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| DomainError::Video(format!("create output dir: {}", e)))?;

        let quality = quality.unwrap_or(self.default_quality.as_str());
        info!(vod_id = %vod_id, quality, "downloading VOD");
        let start = Instant::now();
        self.video.download(vod_id, quality, &path).await?;

        let size = tokio::fs::metadata(&path)
            .await
            .map_err(|e| DomainError::Video(format!("downloaded file missing: {}", e)))?
            .len();
        info!(
            vod_id = %vod_id,
            size_mb = size / 1024 / 1024,
            elapsed_s = start.elapsed().as_secs(),
            path = %path.display(),
            "VOD downloaded"
        );
        Ok(path)
    }

    pub async fn download_chat(
        &self,
        vod_id: &VodId,
        vod_duration: u64,
        cancel: &CancellationToken,
    ) -> Result<ChatTranscript, DomainError> {
        self.chat.download_chat(vod_id, vod_duration, cancel).await
    }

    /// Chat for several VODs at once. Durations come from the catalog when
    /// configured; otherwise the duration bound is disabled. A failed lookup
    /// only fails that VOD's slot. Repeated ids run once.
    pub async fn download_chats(
        &self,
        vod_ids: &[VodId],
        cancel: &CancellationToken,
    ) -> Vec<(VodId, Result<ChatTranscript, DomainError>)> {
        let mut unique: Vec<&VodId> = Vec::with_capacity(vod_ids.len());
        for vod_id in vod_ids {
            if !unique.contains(&vod_id) {
                unique.push(vod_id);
            }
        }

        let mut lookups: Vec<Option<DomainError>> = Vec::with_capacity(unique.len());
        let mut jobs = Vec::with_capacity(unique.len());
        for vod_id in &unique {
            let duration = match &self.catalog {
                Some(catalog) => catalog
                    .get_vod_metadata(vod_id)
                    .await
                    .map(|vod| vod.duration_secs),
                None => Ok(0),
            };
            match duration {
                Ok(duration) => {
                    jobs.push(((*vod_id).clone(), duration));
                    lookups.push(None);
                }
                Err(e) => {
                    warn!(vod_id = %vod_id, error = %e, "metadata lookup failed, skipping chat");
                    lookups.push(Some(e));
                }
            }
        }

        let mut fetched = self.chat.download_many(jobs, cancel).await.into_iter();
        unique
            .into_iter()
            .zip(lookups)
            .map(|(vod_id, lookup)| {
                let result = match lookup {
                    Some(e) => Err(e),
                    None => fetched.next().map(|(_, r)| r).unwrap_or_else(|| {
                        Err(DomainError::Task(format!("no chat result for {}", vod_id)))
                    }),
                };
                (vod_id.clone(), result)
            })
            .collect()
    }

    /// Latest VOD of `channel`, then its video, then its chat.
    pub async fn fetch_all(
        &self,
        channel: &str,
        quality: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<(VodInfo, PathBuf, ChatTranscript), DomainError> {
        let vod = self.latest_vod(channel).await?;
        let video_path = self.download_video(&vod.id, quality).await?;
        let transcript = self
            .download_chat(&vod.id, vod.duration_secs, cancel)
            .await?;
        Ok((vod, video_path, transcript))
    }
}

async fn is_cached_video(path: &Path) -> bool {
    match tokio::fs::metadata(path).await {
        Ok(meta) => meta.is_file() && meta.len() > MIN_VALID_VIDEO_SIZE,
        Err(_) => false,
    }
}
