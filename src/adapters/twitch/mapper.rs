//! Map Twitch wire types to domain entities.
//!
//! GQL comment nodes become ChatMessage; Helix video objects become VodInfo.

use crate::adapters::twitch::gql_client::GqlNode;
use crate::adapters::twitch::helix_client::HelixVideo;
use crate::domain::{ChatMessage, Emote, VodId, VodInfo};
use chrono::{DateTime, Utc};

/// Whole-second offset of a raw node, used for the cursor even when the node is dropped.
pub fn node_offset_secs(node: &GqlNode) -> u64 {
    let s = node.content_offset_seconds;
    if s.is_finite() && s > 0.0 { s.floor() as u64 } else { 0 }
}

/// Map a GQL comment node to a ChatMessage.
///
/// Returns None for records without an id or without text (sub alerts and
/// other notices).
pub fn message_from_node(node: &GqlNode) -> Option<ChatMessage> {
    if node.id.is_empty() {
        return None;
    }
    let message = node.message.as_ref()?;

    let mut body = String::new();
    let mut emotes = Vec::new();
    for frag in &message.fragments {
        body.push_str(&frag.text);
        if let Some(emote) = &frag.emote {
            emotes.push(Emote {
                name: frag.text.trim().to_string(),
                id: emote.emote_id.clone(),
            });
        }
    }
    let body = body.trim().to_string();
    if body.is_empty() {
        return None;
    }

    let badges: Vec<String> = message
        .user_badges
        .iter()
        .map(|b| b.set_id.clone())
        .filter(|s| !s.is_empty())
        .collect();
    let author = node
        .commenter
        .as_ref()
        .and_then(|c| c.display_name.clone())
        .unwrap_or_else(|| "unknown".to_string());

    Some(ChatMessage {
        id: node.id.clone(),
        offset_seconds: node.content_offset_seconds,
        author,
        body,
        emotes,
        color: message.user_color.clone(),
        is_subscriber: badges.iter().any(|b| b == "subscriber"),
        is_moderator: badges.iter().any(|b| b == "moderator"),
        badges,
    })
}

/// Parse a Twitch duration string into seconds: "6h14m27s" -> 22467.
/// Unknown characters are ignored; an empty string is 0.
pub fn parse_twitch_duration(duration: &str) -> u64 {
    let mut total = 0u64;
    let mut value = 0u64;
    for c in duration.chars() {
        match c {
            '0'..='9' => {
                value = value
                    .saturating_mul(10)
                    .saturating_add(u64::from(c as u8 - b'0'))
            }
            'h' => {
                total = total.saturating_add(value.saturating_mul(3600));
                value = 0;
            }
            'm' => {
                total = total.saturating_add(value.saturating_mul(60));
                value = 0;
            }
            's' => {
                total = total.saturating_add(value);
                value = 0;
            }
            _ => value = 0,
        }
    }
    total
}

/// Map a Helix video object to VodInfo.
pub fn vod_info_from_helix(raw: HelixVideo) -> VodInfo {
    let url = raw
        .url
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| format!("https://www.twitch.tv/videos/{}", raw.id));
    let created_at = raw
        .created_at
        .as_deref()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|d| d.with_timezone(&Utc));

    VodInfo {
        id: VodId::new(raw.id),
        title: raw.title.unwrap_or_else(|| "Untitled Stream".to_string()),
        user_name: raw.user_name.unwrap_or_default(),
        user_id: raw.user_id.unwrap_or_default(),
        created_at,
        duration_secs: parse_twitch_duration(raw.duration.as_deref().unwrap_or("0s")),
        view_count: raw.view_count.unwrap_or(0),
        url,
        thumbnail_url: raw
            .thumbnail_url
            .unwrap_or_default()
            .replace("%{width}x%{height}", "1280x720"),
        language: raw.language.unwrap_or_else(|| "en".to_string()),
    }
}
