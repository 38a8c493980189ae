//! Core domain layer. No external I/O dependencies.
//!
//! Entities and business rules live here. Dependencies flow inward.

pub mod aggregator;
pub mod entities;
pub mod errors;

pub use aggregator::{ChatAggregator, PageSummary, RunState};
pub use entities::{ChatMessage, ChatTranscript, Emote, Page, TwitchUser, VodId, VodInfo};
pub use errors::{DomainError, FetchError};
