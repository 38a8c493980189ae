//! Deduplicating aggregator: folds fetched pages into one transcript and decides
//! whether pagination continues.
//!
//! The cursor is a coarse timestamp, so consecutive pages overlap on the
//! boundary second. Deduplication is by message id only. The cursor lives in
//! the aggregator value; each run owns its own instance.
//!
//! Known gap: the endpoint returns at most one page per distinct second. When
//! more messages share one second than a page holds, the overflow cannot be
//! observed through this API. "Exhausted" means complete modulo that gap.

use crate::domain::{ChatMessage, Page};
use std::collections::HashSet;

/// Pipeline state for one VOD run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// More pages expected; fetch the next one at `next_offset`.
    Continuing { next_offset: u64 },
    /// The stream has been fully walked.
    Exhausted,
    /// The page ceiling was reached.
    Capped,
    /// A page failed terminally.
    Failed,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunState::Continuing { .. })
    }
}

/// What one `ingest` call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSummary {
    pub new_messages: usize,
    pub duplicates: usize,
    pub state: RunState,
}

#[derive(Debug)]
pub struct ChatAggregator {
    /// 0 disables the duration bound.
    vod_duration: u64,
    max_pages: u32,
    offset: u64,
    pages_fetched: u32,
    state: RunState,
    messages: Vec<ChatMessage>,
    seen: HashSet<String>,
}

impl ChatAggregator {
    pub fn new(vod_duration: u64, max_pages: u32) -> Self {
        Self {
            vod_duration,
            max_pages,
            offset: 0,
            pages_fetched: 0,
            state: RunState::Continuing { next_offset: 0 },
            messages: Vec::new(),
            seen: HashSet::new(),
        }
    }

    /// Offset of the next page to request.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn pages_fetched(&self) -> u32 {
        self.pages_fetched
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Fold one page into the transcript and advance the state machine.
    /// Pages arriving after a terminal state are ignored.
    pub fn ingest(&mut self, page: Page) -> PageSummary {
        if self.state.is_terminal() {
            return PageSummary {
                new_messages: 0,
                duplicates: 0,
                state: self.state,
            };
        }
        self.pages_fetched += 1;

        if page.is_empty() {
            self.state = RunState::Exhausted;
            return PageSummary {
                new_messages: 0,
                duplicates: 0,
                state: self.state,
            };
        }

        let mut new_messages = 0usize;
        let mut duplicates = 0usize;
        let mut batch_max = self.offset;
        for msg in page.messages {
            batch_max = batch_max.max(msg.offset_secs());
            if self.seen.contains(&msg.id) {
                duplicates += 1;
                continue;
            }
            self.seen.insert(msg.id.clone());
            self.messages.push(msg);
            new_messages += 1;
        }

        self.state = match page.next_offset {
            None => RunState::Exhausted,
            Some(hint) => self.advance(batch_max.max(hint), new_messages),
        };

        PageSummary {
            new_messages,
            duplicates,
            state: self.state,
        }
    }

    fn advance(&mut self, candidate: u64, new_messages: usize) -> RunState {
        // A page of pure repeats at the same second would be requested forever.
        let next = if candidate <= self.offset && new_messages == 0 {
            self.offset + 1
        } else {
            candidate
        };

        if self.vod_duration > 0 && next >= self.vod_duration {
            return RunState::Exhausted;
        }
        if self.pages_fetched >= self.max_pages {
            return RunState::Capped;
        }
        self.offset = next;
        RunState::Continuing { next_offset: next }
    }

    /// Mark the run as failed. The transcript must not be persisted afterwards.
    pub fn fail(&mut self) {
        self.state = RunState::Failed;
    }

    /// Consume the aggregator, yielding the deduplicated messages in first-seen order.
    pub fn into_messages(self) -> Vec<ChatMessage> {
        self.messages
    }
}
