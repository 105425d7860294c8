//! Conversation memory: a bounded window of the most recent exchanges,
//! rendered as history text for agent prompts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

pub const DEFAULT_WINDOW: usize = 5;

/// One completed request/answer pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exchange {
    pub input: String,
    pub output: String,
    pub recorded_at: DateTime<Utc>,
}

impl Exchange {
    pub fn new(input: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            recorded_at: Utc::now(),
        }
    }
}

/// Holds at most `window` exchanges; the oldest is evicted first.
///
/// Not synchronised. Callers that share one memory across requests must hold
/// a lock across snapshot and append.
#[derive(Debug, Clone)]
pub struct ConversationMemory {
    window: usize,
    exchanges: VecDeque<Exchange>,
}

impl ConversationMemory {
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            window,
            exchanges: VecDeque::with_capacity(window),
        }
    }

    /// Render the window as `Human:`/`AI:` lines, oldest first.
    pub fn snapshot(&self) -> String {
        self.exchanges
            .iter()
            .map(|e| format!("Human: {}\nAI: {}", e.input, e.output))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn append(&mut self, exchange: Exchange) {
        while self.exchanges.len() >= self.window {
            self.exchanges.pop_front();
        }
        self.exchanges.push_back(exchange);
    }

    pub fn exchanges(&self) -> impl Iterator<Item = &Exchange> {
        self.exchanges.iter()
    }

    pub fn last_activity(&self) -> Option<DateTime<Utc>> {
        self.exchanges.back().map(|e| e.recorded_at)
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn len(&self) -> usize {
        self.exchanges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exchanges.is_empty()
    }

    pub fn clear(&mut self) {
        self.exchanges.clear();
    }
}

impl Default for ConversationMemory {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}
