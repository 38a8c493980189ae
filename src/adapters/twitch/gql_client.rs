//! Implements ChatPageSource against the Twitch GQL endpoint.
//!
//! One POST per page using the `VideoCommentsByOffsetOrCursor` persisted query,
//! paginated by `contentOffsetSeconds`. No retries here; failures are classified
//! and handed back to the retry policy.

use crate::adapters::twitch::http::{classify_reqwest_error, classify_status};
use crate::adapters::twitch::mapper;
use crate::domain::{DomainError, FetchError, Page, VodId};
use crate::ports::ChatPageSource;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

pub const GQL_URL: &str = "https://gql.twitch.tv/gql";

/// Public web client ID used by twitch.tv itself. Not a secret.
const PUBLIC_CLIENT_ID: &str = "kimne78kx3ncx6brgo4mv6wki5h1ko";

/// sha256 of the VideoCommentsByOffsetOrCursor query body (Apollo persisted query).
const VOD_COMMENTS_HASH: &str = "b70a3591ff0f4e0313d126c6a1502d79a1c02baebb288227c582044aa76adf6a";

pub struct GqlChatSource {
    client: reqwest::Client,
    endpoint: String,
}

impl GqlChatSource {
    pub fn new(timeout: Duration) -> Result<Self, DomainError> {
        Self::with_endpoint(GQL_URL, timeout)
    }

    /// Point at a different GQL endpoint (mirrors, local mocks).
    pub fn with_endpoint(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, DomainError> {
        let mut headers = HeaderMap::new();
        headers.insert("Client-ID", HeaderValue::from_static(PUBLIC_CLIENT_ID));
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| DomainError::Config(format!("build GQL client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    fn request_body(vod_id: &VodId, offset: u64) -> serde_json::Value {
        serde_json::json!([{
            "operationName": "VideoCommentsByOffsetOrCursor",
            "variables": {
                "videoID": vod_id.as_str(),
                "contentOffsetSeconds": offset,
            },
            "extensions": {
                "persistedQuery": {
                    "version": 1,
                    "sha256Hash": VOD_COMMENTS_HASH,
                }
            }
        }])
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Wire types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct GqlResponse {
    data: Option<GqlData>,
    #[serde(default)]
    errors: Option<Vec<serde_json::Value>>,
}

#[derive(Deserialize)]
struct GqlData {
    video: Option<GqlVideo>,
}

#[derive(Deserialize)]
struct GqlVideo {
    comments: Option<GqlComments>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GqlComments {
    #[serde(default)]
    edges: Vec<GqlEdge>,
    #[serde(default)]
    page_info: GqlPageInfo,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct GqlPageInfo {
    #[serde(default)]
    has_next_page: bool,
}

#[derive(Deserialize)]
struct GqlEdge {
    node: GqlNode,
}

/// One raw comment record.
#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GqlNode {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub content_offset_seconds: f64,
    #[serde(default)]
    pub commenter: Option<GqlCommenter>,
    #[serde(default)]
    pub message: Option<GqlMessage>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GqlCommenter {
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GqlMessage {
    #[serde(default)]
    pub fragments: Vec<GqlFragment>,
    #[serde(default)]
    pub user_badges: Vec<GqlBadge>,
    #[serde(default)]
    pub user_color: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct GqlFragment {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub emote: Option<GqlEmote>,
}

#[derive(Deserialize, Default)]
pub struct GqlEmote {
    #[serde(rename = "emoteID", default)]
    pub emote_id: String,
}

#[derive(Deserialize, Default)]
pub struct GqlBadge {
    #[serde(rename = "setID", default)]
    pub set_id: String,
}

/// Parse a GQL response body into a Page.
///
/// Application-level errors and a missing video are fatal. A video without a
/// comments object is treated as an empty page.
pub fn parse_page(body: &str) -> Result<Page, FetchError> {
    let responses: Vec<GqlResponse> = serde_json::from_str(body)
        .map_err(|e| FetchError::Fatal(format!("malformed GQL response: {}", e)))?;
    let response = responses
        .into_iter()
        .next()
        .ok_or_else(|| FetchError::Fatal("empty GQL response".into()))?;

    if let Some(errors) = response.errors.filter(|e| !e.is_empty()) {
        return Err(FetchError::Fatal(format!(
            "GQL error: {}",
            serde_json::Value::Array(errors)
        )));
    }

    let video = response
        .data
        .and_then(|d| d.video)
        .ok_or_else(|| FetchError::Fatal("VOD not found".into()))?;
    let Some(comments) = video.comments else {
        return Ok(Page::default());
    };

    let mut max_offset = 0u64;
    let mut messages = Vec::with_capacity(comments.edges.len());
    let mut skipped = 0usize;
    for edge in &comments.edges {
        match mapper::message_from_node(&edge.node) {
            Some(m) => {
                max_offset = max_offset.max(m.offset_secs());
                messages.push(m);
            }
            None => {
                max_offset = max_offset.max(mapper::node_offset_secs(&edge.node));
                skipped += 1;
            }
        }
    }

    Ok(Page {
        messages,
        skipped,
        next_offset: comments.page_info.has_next_page.then_some(max_offset),
    })
}

#[async_trait::async_trait]
impl ChatPageSource for GqlChatSource {
    async fn fetch_page(&self, vod_id: &VodId, offset: u64) -> Result<Page, FetchError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&Self::request_body(vod_id, offset))
            .send()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;
        if !status.is_success() {
            return Err(classify_status(status, &body));
        }

        let page = parse_page(&body)?;
        debug!(
            vod_id = %vod_id,
            offset,
            count = page.messages.len(),
            skipped = page.skipped,
            has_next = page.next_offset.is_some(),
            "GQL page received"
        );
        Ok(page)
    }
}
