//! Implements InputPort. Inquire-based interactive menu.
//!
//! Downloads run under a fresh CancellationToken; Ctrl-C cancels it and the
//! menu comes back. Ctrl-C at a prompt exits.

use crate::adapters::tools::ytdlp::quality_presets;
use crate::adapters::ui::banner::{CYBER_GREEN, TWITCH_PURPLE};
use crate::domain::{ChatTranscript, DomainError, VodId};
use crate::ports::InputPort;
use crate::usecases::VodService;
use async_trait::async_trait;
use indicatif::{ProgressBar, ProgressStyle};
use inquire::ui::{Color, RenderConfig, StyleSheet, Styled};
use inquire::{InquireError, Select, Text};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

fn rgb(c: (u8, u8, u8)) -> Color {
    Color::Rgb {
        r: c.0,
        g: c.1,
        b: c.2,
    }
}

/// Neon theme for every subsequent inquire prompt.
pub fn apply_theme() {
    let config = RenderConfig::default()
        .with_prompt_prefix(Styled::new("?").with_fg(rgb(TWITCH_PURPLE)))
        .with_highlighted_option_prefix(Styled::new(">").with_fg(rgb(CYBER_GREEN)))
        .with_selected_option(Some(StyleSheet::new().with_fg(rgb(CYBER_GREEN))))
        .with_answer(StyleSheet::new().with_fg(rgb(CYBER_GREEN)));
    inquire::set_global_render_config(config);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MenuAction {
    LatestVod,
    ChatById,
    ChatBatch,
    FullFetch,
    Exit,
}

impl MenuAction {
    const ALL: [MenuAction; 5] = [
        MenuAction::LatestVod,
        MenuAction::ChatById,
        MenuAction::ChatBatch,
        MenuAction::FullFetch,
        MenuAction::Exit,
    ];
}

impl fmt::Display for MenuAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MenuAction::LatestVod => "Latest VOD of a channel",
            MenuAction::ChatById => "Chat by VOD id",
            MenuAction::ChatBatch => "Chat for several VOD ids",
            MenuAction::FullFetch => "Full fetch (latest VOD: video + chat)",
            MenuAction::Exit => "Exit",
        };
        f.write_str(label)
    }
}

/// Accepts bare ids and `twitch.tv/videos/<id>` URLs, separated by commas or whitespace.
pub fn parse_vod_ids(input: &str) -> Vec<VodId> {
    input
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter_map(|token| {
            let token = token.trim().trim_end_matches('/');
            let id = match token.rfind("/videos/") {
                Some(pos) => &token[pos + "/videos/".len()..],
                None => token,
            };
            let id = id.split(['?', '#']).next().unwrap_or_default();
            (!id.is_empty() && id.chars().all(|c| c.is_ascii_digit())).then(|| VodId::new(id))
        })
        .collect()
}

fn spinner(message: impl Into<String>) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.magenta} {msg} [{elapsed}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.into());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Token cancelled on Ctrl-C. Abort the handle once the guarded work ends.
fn cancel_on_ctrl_c() -> (CancellationToken, JoinHandle<()>) {
    let token = CancellationToken::new();
    let trigger = token.clone();
    let handle = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping after the current request");
            trigger.cancel();
        }
    });
    (token, handle)
}

fn ui_err(e: InquireError) -> DomainError {
    DomainError::Ui(e.to_string())
}

fn print_transcript(transcript: &ChatTranscript, path: &std::path::Path) {
    let source = if transcript.from_cache {
        "cache"
    } else {
        "network"
    };
    println!(
        "Chat {}: {} messages from {} ({} pages) -> {}",
        transcript.vod_id,
        transcript.len(),
        source,
        transcript.pages_fetched,
        path.display()
    );
    if transcript.truncated {
        println!("  page ceiling reached; transcript may be incomplete");
    }
}

/// TUI adapter. Inquire prompts.
pub struct TuiInputPort {
    vods: Arc<VodService>,
}

impl TuiInputPort {
    pub fn new(vods: Arc<VodService>) -> Self {
        Self { vods }
    }

    fn prompt_quality(&self) -> Result<String, InquireError> {
        let presets = quality_presets();
        let start = presets
            .iter()
            .position(|q| *q == self.vods.default_quality())
            .unwrap_or(0);
        Select::new("Quality:", presets)
            .with_starting_cursor(start)
            .prompt()
            .map(str::to_string)
    }

    async fn latest_vod(&self) -> Result<(), DomainError> {
        let channel = Text::new("Channel login:").prompt().map_err(ui_err)?;
        let pb = spinner(format!("looking up {}", channel.trim()));
        let result = self.vods.latest_vod(channel.trim()).await;
        pb.finish_and_clear();
        let vod = result?;
        println!("{} | {}", vod.id, vod.title);
        println!(
            "  {} | {}s | {} views | {}",
            vod.user_name, vod.duration_secs, vod.view_count, vod.url
        );
        Ok(())
    }

    async fn chat_by_id(&self) -> Result<(), DomainError> {
        let input = Text::new("VOD id or URL:").prompt().map_err(ui_err)?;
        let Some(vod_id) = parse_vod_ids(&input).into_iter().next() else {
            println!("Not a VOD id: {}", input.trim());
            return Ok(());
        };

        let duration = match self.vods.vod_metadata(&vod_id).await {
            Ok(vod) => vod.duration_secs,
            Err(DomainError::Config(_)) => 0,
            Err(e) => return Err(e),
        };

        let (cancel, ctrl_c) = cancel_on_ctrl_c();
        let pb = spinner(format!("downloading chat {}", vod_id));
        let result = self.vods.download_chat(&vod_id, duration, &cancel).await;
        pb.finish_and_clear();
        ctrl_c.abort();

        print_transcript(&result?, &self.vods.chat_path(&vod_id));
        Ok(())
    }

    async fn chat_batch(&self) -> Result<(), DomainError> {
        let input = Text::new("VOD ids or URLs (comma separated):")
            .prompt()
            .map_err(ui_err)?;
        let ids = parse_vod_ids(&input);
        if ids.is_empty() {
            println!("No VOD ids given.");
            return Ok(());
        }

        let (cancel, ctrl_c) = cancel_on_ctrl_c();
        let pb = spinner(format!("downloading {} chats", ids.len()));
        let result = self.vods.download_chats(&ids, &cancel).await;
        pb.finish_and_clear();
        ctrl_c.abort();

        for (vod_id, outcome) in result {
            match outcome {
                Ok(transcript) => print_transcript(&transcript, &self.vods.chat_path(&vod_id)),
                Err(e) => println!("Chat {}: failed: {}", vod_id, e),
            }
        }
        Ok(())
    }

    async fn full_fetch(&self) -> Result<(), DomainError> {
        let channel = Text::new("Channel login:").prompt().map_err(ui_err)?;
        let quality = self.prompt_quality().map_err(ui_err)?;

        let (cancel, ctrl_c) = cancel_on_ctrl_c();
        let result = self
            .vods
            .fetch_all(channel.trim(), Some(&quality), &cancel)
            .await;
        ctrl_c.abort();

        let (vod, video_path, transcript) = result?;
        println!("{} | {}", vod.id, vod.title);
        println!("Video -> {}", video_path.display());
        print_transcript(&transcript, &self.vods.chat_path(&vod.id));
        Ok(())
    }
}

#[async_trait]
impl InputPort for TuiInputPort {
    async fn run(&self) -> Result<(), DomainError> {
        loop {
            let action = match Select::new("What next?", MenuAction::ALL.to_vec()).prompt() {
                Ok(action) => action,
                Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => {
                    return Ok(());
                }
                Err(e) => return Err(ui_err(e)),
            };

            let outcome = match action {
                MenuAction::LatestVod => self.latest_vod().await,
                MenuAction::ChatById => self.chat_by_id().await,
                MenuAction::ChatBatch => self.chat_batch().await,
                MenuAction::FullFetch => self.full_fetch().await,
                MenuAction::Exit => return Ok(()),
            };

            match outcome {
                Ok(()) => {}
                Err(e) if e.is_cancelled() => println!("Interrupted. Nothing was saved."),
                Err(e) => {
                    error!(error = %e, "action failed");
                    println!("Error: {}", e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ids_and_urls() {
        let ids = parse_vod_ids(
            "123, https://www.twitch.tv/videos/456?t=1h2m  twitch.tv/videos/789/",
        );
        assert_eq!(
            ids,
            vec![VodId::new("123"), VodId::new("456"), VodId::new("789")]
        );
    }

    #[test]
    fn ignores_garbage_tokens() {
        assert!(parse_vod_ids("abc, , https://twitch.tv/streamer").is_empty());
    }

    #[test]
    fn menu_lists_exit_last() {
        assert_eq!(MenuAction::ALL.last(), Some(&MenuAction::Exit));
        assert_eq!(MenuAction::ChatById.to_string(), "Chat by VOD id");
    }
}
