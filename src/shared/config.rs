//! Application configuration. API credentials, paths, chat pipeline tuning.

use crate::domain::DomainError;
use crate::shared::rate_limit::RateLimiter;
use crate::shared::retry::RetryPolicy;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_OUTPUT_DIR: &str = "output/raw";
pub const DEFAULT_QUALITY: &str = "best";
pub const DEFAULT_CHAT_MAX_PAGES: u32 = 10_000;

/// Raw configuration. Every field is optional; the `*_or_default` helpers apply defaults.
///
/// Sources, high to low priority: `TWITCH_*` environment variables (after `.env`),
/// then the YAML/TOML file named by `TWITCH_CONFIG`.
#[derive(Debug, Deserialize, Default, Clone)]
pub struct AppConfig {
    /// Helix app credentials. Read from TWITCH_CLIENT_ID / TWITCH_CLIENT_SECRET.
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,

    #[serde(default)]
    pub user_access_token: Option<String>,

    /// Netscape cookies file handed to yt-dlp (sub-only VODs).
    #[serde(default)]
    pub cookies_file: Option<String>,

    #[serde(default)]
    pub download_quality: Option<String>,

    #[serde(default)]
    pub output_dir: Option<String>,

    // ─────────────────────────────────────────────────────────────────────────
    // HTTP
    // ─────────────────────────────────────────────────────────────────────────
    #[serde(default)]
    pub api_timeout_secs: Option<u64>,

    /// Total attempts per request (first try included).
    #[serde(default)]
    pub api_retries: Option<u32>,

    #[serde(default)]
    pub backoff_base_ms: Option<u64>,

    #[serde(default)]
    pub backoff_cap_ms: Option<u64>,

    // ─────────────────────────────────────────────────────────────────────────
    // Chat pagination
    // ─────────────────────────────────────────────────────────────────────────
    /// Hard ceiling on pages per VOD.
    #[serde(default)]
    pub chat_max_pages: Option<u32>,

    #[serde(default)]
    pub chat_rate_limit_min_ms: Option<u64>,

    #[serde(default)]
    pub chat_rate_limit_max_ms: Option<u64>,
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let mut c = config::Config::builder();
        if let Ok(path) = std::env::var("TWITCH_CONFIG") {
            c = c.add_source(config::File::with_name(&path));
        }
        c = c.add_source(config::Environment::with_prefix("TWITCH").try_parsing(true));
        c.build()?.try_deserialize()
    }

    pub fn output_dir_or_default(&self) -> PathBuf {
        PathBuf::from(self.output_dir.as_deref().unwrap_or(DEFAULT_OUTPUT_DIR))
    }

    pub fn download_quality_or_default(&self) -> String {
        self.download_quality
            .clone()
            .unwrap_or_else(|| DEFAULT_QUALITY.to_string())
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api_timeout_secs.unwrap_or(30))
    }

    /// Cookies file, only if it exists on disk.
    pub fn cookies_path(&self) -> Option<PathBuf> {
        self.cookies_file
            .as_deref()
            .map(PathBuf::from)
            .filter(|p| p.exists())
    }

    /// Returns true if Helix credentials are present.
    pub fn is_catalog_configured(&self) -> bool {
        self.client_id.as_deref().is_some_and(|s| !s.is_empty())
            && self.client_secret.as_deref().is_some_and(|s| !s.is_empty())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let base = self.backoff_base_ms.unwrap_or(1_000);
        RetryPolicy {
            max_attempts: self.api_retries.unwrap_or(3),
            base_delay: Duration::from_millis(base),
            max_delay: Duration::from_millis(self.backoff_cap_ms.unwrap_or(10_000)),
            jitter: base > 0,
        }
    }

    pub fn rate_limiter(&self) -> RateLimiter {
        RateLimiter::new(
            Duration::from_millis(self.chat_rate_limit_min_ms.unwrap_or(50)),
            Duration::from_millis(self.chat_rate_limit_max_ms.unwrap_or(500)),
        )
    }

    /// Immutable per-run chat settings, validated.
    pub fn chat_settings(&self) -> Result<ChatSettings, DomainError> {
        if let (Some(min), Some(max)) = (self.chat_rate_limit_min_ms, self.chat_rate_limit_max_ms) {
            if min > max {
                return Err(DomainError::Config(format!(
                    "chat_rate_limit_min_ms ({}) exceeds chat_rate_limit_max_ms ({})",
                    min, max
                )));
            }
        }
        let settings = ChatSettings {
            retry: self.retry_policy(),
            rate_limit: self.rate_limiter(),
            max_pages: self.chat_max_pages.unwrap_or(DEFAULT_CHAT_MAX_PAGES),
            request_timeout: self.api_timeout(),
        };
        settings.validate()?;
        Ok(settings)
    }
}

/// Parameters of one chat pipeline run. Treated as immutable for the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatSettings {
    pub retry: RetryPolicy,
    pub rate_limit: RateLimiter,
    pub max_pages: u32,
    pub request_timeout: Duration,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            rate_limit: RateLimiter::default(),
            max_pages: DEFAULT_CHAT_MAX_PAGES,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl ChatSettings {
    /// Zero-delay settings: no backoff sleep, no pause between pages.
    pub fn immediate(max_pages: u32, max_attempts: u32) -> Self {
        Self {
            retry: RetryPolicy::immediate(max_attempts),
            rate_limit: RateLimiter::disabled(),
            max_pages,
            request_timeout: Duration::from_secs(30),
        }
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.max_pages == 0 {
            return Err(DomainError::Config("chat_max_pages must be at least 1".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(DomainError::Config("api_retries must be at least 1".into()));
        }
        if self.retry.base_delay > self.retry.max_delay {
            return Err(DomainError::Config(format!(
                "backoff base ({} ms) exceeds backoff cap ({} ms)",
                self.retry.base_delay.as_millis(),
                self.retry.max_delay.as_millis()
            )));
        }
        if self.request_timeout.is_zero() {
            return Err(DomainError::Config("api_timeout_secs must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = AppConfig::default();
        let s = cfg.chat_settings().unwrap();
        assert_eq!(s.max_pages, 10_000);
        assert_eq!(s.retry.max_attempts, 3);
        assert_eq!(s.retry.base_delay, Duration::from_secs(1));
        assert_eq!(s.retry.max_delay, Duration::from_secs(10));
        assert_eq!(
            s.rate_limit.bounds(),
            (Duration::from_millis(50), Duration::from_millis(500))
        );
        assert_eq!(s.request_timeout, Duration::from_secs(30));
        assert_eq!(cfg.output_dir_or_default(), PathBuf::from("output/raw"));
        assert_eq!(cfg.download_quality_or_default(), "best");
    }

    #[test]
    fn zero_page_ceiling_is_rejected() {
        let cfg = AppConfig {
            chat_max_pages: Some(0),
            ..Default::default()
        };
        assert!(matches!(cfg.chat_settings(), Err(DomainError::Config(_))));
    }

    #[test]
    fn inverted_rate_limit_is_rejected() {
        let cfg = AppConfig {
            chat_rate_limit_min_ms: Some(900),
            chat_rate_limit_max_ms: Some(100),
            ..Default::default()
        };
        assert!(matches!(cfg.chat_settings(), Err(DomainError::Config(_))));
    }

    #[test]
    fn backoff_base_above_cap_is_rejected() {
        let cfg = AppConfig {
            backoff_base_ms: Some(20_000),
            backoff_cap_ms: Some(1_000),
            ..Default::default()
        };
        assert!(matches!(cfg.chat_settings(), Err(DomainError::Config(_))));
    }

    #[test]
    fn catalog_requires_both_credentials() {
        let mut cfg = AppConfig {
            client_id: Some("id".into()),
            ..Default::default()
        };
        assert!(!cfg.is_catalog_configured());
        cfg.client_secret = Some("secret".into());
        assert!(cfg.is_catalog_configured());
    }
}
