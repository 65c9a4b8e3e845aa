//! Bounded, time-decaying rolling history of accepted messages.

use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::core::message::ChatMessage;

/// Ordered history of accepted messages, bounded both by count and by
/// age. Eviction is lazy: it runs at the top of every access against the
/// clock value the caller passes in, never from a background timer, so
/// the contents are deterministic for a given clock.
pub struct MessageBuffer {
    messages: VecDeque<ChatMessage>,
    max_count: usize,
    max_age: chrono::Duration,
}

impl MessageBuffer {
    pub fn new(max_count: usize, max_age: Duration) -> Self {
        Self {
            messages: VecDeque::with_capacity(max_count),
            max_count,
            max_age: chrono::Duration::from_std(max_age)
                .unwrap_or_else(|_| chrono::Duration::seconds(i64::MAX / 1_000)),
        }
    }

    /// Append a message in arrival order, then enforce both bounds.
    /// Messages are never reordered or mutated once inserted.
    pub fn append(&mut self, message: ChatMessage, now: DateTime<Utc>) {
        self.evict_expired(now);
        self.messages.push_back(message);
        // Count cap is enforced from the oldest end, only on insert.
        while self.messages.len() > self.max_count {
            self.messages.pop_front();
        }
    }

    /// The current ordered history, oldest first.
    pub fn snapshot(&mut self, now: DateTime<Utc>) -> Vec<ChatMessage> {
        self.evict_expired(now);
        self.messages.iter().cloned().collect()
    }

    /// The last `depth` non-bot messages, oldest first. This is the
    /// context window handed to the reply collaborator.
    pub fn context_for_bot(&mut self, now: DateTime<Utc>, depth: usize) -> Vec<ChatMessage> {
        self.evict_expired(now);
        let mut context: Vec<ChatMessage> = self
            .messages
            .iter()
            .rev()
            .filter(|msg| !msg.is_bot)
            .take(depth)
            .cloned()
            .collect();
        context.reverse();
        context
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    fn evict_expired(&mut self, now: DateTime<Utc>) {
        while let Some(oldest) = self.messages.front() {
            if now - oldest.timestamp >= self.max_age {
                self.messages.pop_front();
            } else {
                break;
            }
        }
    }
}
