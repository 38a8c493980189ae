//! Domain entities. Pure data structures for the core business.
//!
//! No HTTP/IO types here; adapters map into these.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of one archived stream. Opaque to the core; immutable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VodId(String);

impl VodId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VodId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Emote fragment inside a chat message body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Emote {
    pub name: String,
    pub id: String,
}

/// A single chat message from a VOD.
///
/// Identity is the `id`: two messages with the same id are the same message,
/// regardless of content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    /// Seconds from stream start.
    pub offset_seconds: f64,
    pub author: String,
    pub body: String,
    #[serde(default)]
    pub emotes: Vec<Emote>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub badges: Vec<String>,
    #[serde(default)]
    pub is_subscriber: bool,
    #[serde(default)]
    pub is_moderator: bool,
}

impl ChatMessage {
    /// Whole-second offset, as used by the pagination cursor.
    pub fn offset_secs(&self) -> u64 {
        if self.offset_seconds.is_finite() && self.offset_seconds > 0.0 {
            self.offset_seconds.floor() as u64
        } else {
            0
        }
    }
}

/// One batch returned by the chat endpoint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    /// Messages in the order the endpoint returned them.
    pub messages: Vec<ChatMessage>,
    /// Records the adapter dropped (notices with no text). A page with only
    /// skipped records is still a non-empty page.
    pub skipped: usize,
    /// Continuation hint. `None` marks the stream as exhausted.
    pub next_offset: Option<u64>,
}

impl Page {
    pub fn new(messages: Vec<ChatMessage>, next_offset: Option<u64>) -> Self {
        Self {
            messages,
            skipped: 0,
            next_offset,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty() && self.skipped == 0
    }
}

/// Result of one chat pipeline run (or a cache hit).
#[derive(Debug, Clone, PartialEq)]
pub struct ChatTranscript {
    pub vod_id: VodId,
    /// Deduplicated messages in first-seen order.
    pub messages: Vec<ChatMessage>,
    /// The run stopped at the page ceiling; the transcript may be incomplete.
    pub truncated: bool,
    /// Loaded from an existing artifact; no network activity happened.
    pub from_cache: bool,
    pub pages_fetched: u32,
}

impl ChatTranscript {
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Metadata for a VOD from the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VodInfo {
    pub id: VodId,
    pub title: String,
    pub user_name: String,
    pub user_id: String,
    pub created_at: Option<DateTime<Utc>>,
    /// Total length in seconds.
    pub duration_secs: u64,
    pub view_count: u64,
    pub url: String,
    pub thumbnail_url: String,
    pub language: String,
}

/// A channel resolved from its login name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TwitchUser {
    pub id: String,
    pub login: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(id: &str, offset: f64) -> ChatMessage {
        ChatMessage {
            id: id.into(),
            offset_seconds: offset,
            author: "User".into(),
            body: "hi".into(),
            emotes: vec![],
            color: None,
            badges: vec![],
            is_subscriber: false,
            is_moderator: false,
        }
    }

    #[test]
    fn offset_secs_floors_fractional_offsets() {
        assert_eq!(msg("a", 42.9).offset_secs(), 42);
        assert_eq!(msg("a", 0.0).offset_secs(), 0);
        assert_eq!(msg("a", -3.0).offset_secs(), 0);
        assert_eq!(msg("a", f64::NAN).offset_secs(), 0);
    }

    #[test]
    fn page_with_only_skipped_records_is_not_empty() {
        let mut page = Page::new(vec![], Some(10));
        assert!(page.is_empty());
        page.skipped = 2;
        assert!(!page.is_empty());
    }

    #[test]
    fn chat_message_json_uses_defaults_for_optional_fields() {
        let json = r#"{"id":"x","offset_seconds":1.5,"author":"A","body":"cached"}"#;
        let m: ChatMessage = serde_json::from_str(json).unwrap();
        assert_eq!(m.body, "cached");
        assert!(m.emotes.is_empty());
        assert_eq!(m.color, None);
        assert!(!m.is_subscriber);
    }

    #[test]
    fn vod_id_serializes_as_plain_string() {
        let id = VodId::new("123");
        assert_eq!(serde_json::to_string(&id).unwrap(), r#""123""#);
        assert_eq!(id.to_string(), "123");
    }
}
