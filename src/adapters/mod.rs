//! Infrastructure adapters. Implement outbound ports.
//!
//! Twitch APIs, filesystem cache, yt-dlp, terminal UI. Map errors to DomainError.

pub mod persistence;
pub mod tools;
pub mod twitch;
pub mod ui;
