//! yt-dlp integration. Implements VideoDownloaderPort.
//!
//! Runs the external binary with a quality preset (or raw format string) and an
//! optional cookies file. Output streams straight to the terminal.

use crate::domain::{DomainError, VodId};
use crate::ports::VideoDownloaderPort;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

/// Quality presets to yt-dlp format strings. Anything else is passed through as-is.
const QUALITY_MAP: &[(&str, &str)] = &[
    ("best", "bestvideo[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best"),
    (
        "1080p60",
        "bestvideo[height=1080][fps=60]+bestaudio/bestvideo[height=1080]+bestaudio/best",
    ),
    ("1080p", "bestvideo[height=1080]+bestaudio/best[height<=1080]"),
    (
        "720p60",
        "bestvideo[height=720][fps=60]+bestaudio/bestvideo[height=720]+bestaudio/best",
    ),
    ("720p", "bestvideo[height<=720]+bestaudio/best[height<=720]"),
    ("480p", "bestvideo[height<=480]+bestaudio/best[height<=480]"),
    ("worst", "worstvideo+worstaudio/worst"),
];

pub fn format_for_quality(quality: &str) -> &str {
    QUALITY_MAP
        .iter()
        .find(|(name, _)| *name == quality)
        .map(|(_, fmt)| *fmt)
        .unwrap_or(quality)
}

pub fn quality_presets() -> Vec<&'static str> {
    QUALITY_MAP.iter().map(|(name, _)| *name).collect()
}

pub struct YtDlpDownloader {
    bin_path: PathBuf,
    cookies_file: Option<PathBuf>,
}

impl YtDlpDownloader {
    /// `bin_path` defaults to `yt-dlp` on PATH.
    pub fn new(bin_path: Option<impl AsRef<Path>>, cookies_file: Option<PathBuf>) -> Self {
        Self {
            bin_path: bin_path
                .map(|p| p.as_ref().to_path_buf())
                .unwrap_or_else(|| PathBuf::from("yt-dlp")),
            cookies_file,
        }
    }

    pub fn build_args(&self, vod_id: &VodId, quality: &str, dest: &Path) -> Vec<String> {
        let mut args = vec![
            "--format".to_string(),
            format_for_quality(quality).to_string(),
            "--output".to_string(),
            dest.display().to_string(),
            "--merge-output-format".to_string(),
            "mp4".to_string(),
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
            "--progress".to_string(),
        ];
        if let Some(cookies) = self.cookies_file.as_ref().filter(|p| p.exists()) {
            debug!(path = %cookies.display(), "using cookies file");
            args.push("--cookies".to_string());
            args.push(cookies.display().to_string());
        }
        args.push(format!("https://www.twitch.tv/videos/{}", vod_id));
        args
    }
}

#[async_trait]
impl VideoDownloaderPort for YtDlpDownloader {
    async fn download(&self, vod_id: &VodId, quality: &str, dest: &Path) -> Result<(), DomainError> {
        let args = self.build_args(vod_id, quality, dest);
        info!(vod_id = %vod_id, quality, "running yt-dlp");

        let status = Command::new(&self.bin_path)
            .args(&args)
            .stdin(Stdio::null())
            .status()
            .await
            .map_err(|e| {
                DomainError::Video(format!(
                    "could not start {} (is it installed?): {}",
                    self.bin_path.display(),
                    e
                ))
            })?;

        if !status.success() {
            return Err(DomainError::Video(format!(
                "yt-dlp failed ({}) for VOD {}; see its output above",
                status, vod_id
            )));
        }
        Ok(())
    }
}
