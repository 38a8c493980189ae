//! Implements VodCatalog using the Twitch Helix REST API.
//!
//! App access token via OAuth2 client credentials, cached in memory. A 401
//! clears the token and the request is repeated once with a fresh one.
//! Transient failures go through the shared RetryPolicy.

use crate::adapters::twitch::http::{classify_reqwest_error, classify_status};
use crate::adapters::twitch::mapper;
use crate::domain::{DomainError, FetchError, TwitchUser, VodId, VodInfo};
use crate::ports::VodCatalog;
use crate::shared::RetryPolicy;
use reqwest::StatusCode;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

const HELIX_BASE: &str = "https://api.twitch.tv/helix";
const TOKEN_URL: &str = "https://id.twitch.tv/oauth2/token";

pub struct HelixCatalog {
    client: reqwest::Client,
    client_id: String,
    client_secret: String,
    base_url: String,
    token_url: String,
    token: Mutex<Option<String>>,
    retry: RetryPolicy,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct HelixList<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

#[derive(Deserialize)]
struct HelixUser {
    id: String,
    login: String,
}

/// Helix video object. Only `id` is guaranteed.
#[derive(Debug, Deserialize, Default)]
pub struct HelixVideo {
    pub id: String,
    pub title: Option<String>,
    pub user_name: Option<String>,
    pub user_id: Option<String>,
    pub created_at: Option<String>,
    pub duration: Option<String>,
    pub view_count: Option<u64>,
    pub url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub language: Option<String>,
}

impl HelixCatalog {
    pub fn new(
        client_id: String,
        client_secret: String,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self, DomainError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DomainError::Config(format!("build Helix client: {}", e)))?;
        Ok(Self {
            client,
            client_id,
            client_secret,
            base_url: HELIX_BASE.to_string(),
            token_url: TOKEN_URL.to_string(),
            token: Mutex::new(None),
            retry,
        })
    }

    /// Start with a pre-issued token. A 401 drops it in favour of an app token.
    pub fn with_access_token(self, token: Option<String>) -> Self {
        Self {
            token: Mutex::new(token.filter(|t| !t.is_empty())),
            ..self
        }
    }

    /// Cached app token, fetching a new one if needed.
    async fn app_token(&self) -> Result<String, FetchError> {
        let mut guard = self.token.lock().await;
        if let Some(token) = guard.as_ref() {
            return Ok(token.clone());
        }

        let response = self
            .client
            .post(&self.token_url)
            .query(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("grant_type", "client_credentials"),
            ])
            .send()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &text));
        }
        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| FetchError::Fatal(format!("token response: {}", e)))?;

        debug!("Twitch app token obtained");
        *guard = Some(token.access_token.clone());
        Ok(token.access_token)
    }

    async fn send_get(
        &self,
        url: &str,
        params: &[(&str, &str)],
    ) -> Result<reqwest::Response, FetchError> {
        let token = self.app_token().await?;
        self.client
            .get(url)
            .header("Client-ID", &self.client_id)
            .bearer_auth(token)
            .query(params)
            .send()
            .await
            .map_err(|e| classify_reqwest_error(&e))
    }

    /// One GET attempt; a 401 refreshes the token and repeats the request once.
    async fn get_once<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<T, FetchError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let mut response = self.send_get(&url, params).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            *self.token.lock().await = None;
            response = self.send_get(&url, params).await?;
        }

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &text));
        }
        response
            .json()
            .await
            .map_err(|e| FetchError::Fatal(format!("Helix {} response: {}", endpoint, e)))
    }

    async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<T, DomainError> {
        // Catalog calls are short; they are not tied to a chat run's cancellation.
        let never = CancellationToken::new();
        self.retry
            .run(&never, |_| self.get_once(endpoint, params))
            .await
            .map_err(|e| DomainError::Catalog(format!("{}: {}", endpoint, e)))
    }

    /// Resolve a channel login to its user id.
    pub async fn get_user(&self, login: &str) -> Result<TwitchUser, DomainError> {
        let list: HelixList<HelixUser> = self.get("users", &[("login", login)]).await?;
        let user = list
            .data
            .into_iter()
            .next()
            .ok_or_else(|| DomainError::NotFound(format!("Twitch channel '{}'", login)))?;
        Ok(TwitchUser {
            id: user.id,
            login: user.login,
        })
    }
}

#[async_trait::async_trait]
impl VodCatalog for HelixCatalog {
    async fn get_latest_vod(&self, channel: &str) -> Result<VodInfo, DomainError> {
        let user = self.get_user(channel).await?;
        debug!(user_id = %user.id, login = %user.login, "user resolved");

        let list: HelixList<HelixVideo> = self
            .get(
                "videos",
                &[
                    ("user_id", user.id.as_str()),
                    ("type", "archive"),
                    ("first", "1"),
                    ("sort", "time"),
                ],
            )
            .await?;
        let raw = list.data.into_iter().next().ok_or_else(|| {
            DomainError::NotFound(format!(
                "no recorded VODs for channel '{}' (streams may not be saved or were deleted)",
                channel
            ))
        })?;
        let vod = mapper::vod_info_from_helix(raw);
        info!(vod_id = %vod.id, duration_s = vod.duration_secs, "latest VOD found");
        Ok(vod)
    }

    async fn get_vod_metadata(&self, vod_id: &VodId) -> Result<VodInfo, DomainError> {
        let list: HelixList<HelixVideo> = self.get("videos", &[("id", vod_id.as_str())]).await?;
        let raw = list
            .data
            .into_iter()
            .next()
            .ok_or_else(|| DomainError::NotFound(format!("VOD {}", vod_id)))?;
        Ok(mapper::vod_info_from_helix(raw))
    }
}
