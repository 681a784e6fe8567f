//! Conversation history management.
//!
//! [`MessageStore`] keeps a bounded, deduplicated log of exchanged messages
//! and renders the recent window that is sent as context with each request.

use std::collections::{HashSet, VecDeque};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use parley_core::{
    Role,
    util::{content_hash, sanitize},
};
use tracing::debug;

use crate::message::Message;

/// Line inserted after an AI message inside a context window.
pub const WINDOW_SEPARATOR: &str = "---";

/// Configuration for conversation history management.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryConfig {
    /// Number of messages rendered into the context window.
    /// The store retains at most twice this many.
    pub history_size: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { history_size: 10 }
    }
}

impl HistoryConfig {
    #[must_use]
    pub const fn with_history_size(mut self, size: usize) -> Self {
        self.history_size = size;
        self
    }

    /// Maximum number of stored messages.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.history_size.saturating_mul(2)
    }
}

/// What to drop from the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal<'a> {
    /// The most recent N messages.
    Last(usize),
    /// Every message whose text contains the given substring.
    Containing(&'a str),
}

#[derive(Debug)]
struct Entry {
    hash: String,
    message: Message,
}

#[derive(Debug, Default)]
struct StoreInner {
    entries: VecDeque<Entry>,
    hashes: HashSet<String>,
}

impl StoreInner {
    fn evict_oldest_pair(&mut self) {
        for _ in 0..2 {
            if let Some(entry) = self.entries.pop_front() {
                self.hashes.remove(&entry.hash);
            }
        }
    }
}

/// Thread-safe message log.
///
/// Writers take the write half of the lock, readers the read half, so a
/// reader never sees a store that is halfway through an eviction. A
/// poisoned lock is recovered rather than reported.
#[derive(Debug, Default)]
pub struct MessageStore {
    inner: RwLock<StoreInner>,
}

impl MessageStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a message unless its sanitized text is already stored.
    ///
    /// Dedup ignores the speaker. Once the store holds more than
    /// `config.capacity()` messages the oldest two are evicted together.
    /// Returns `true` if the message was stored.
    pub fn add(&self, role: Role, text: &str, config: &HistoryConfig) -> bool {
        let text = sanitize(text);
        let hash = content_hash(&text);

        let mut inner = self.write();
        if !inner.hashes.insert(hash.clone()) {
            debug!("Skipping duplicate {role} message");
            return false;
        }
        inner.entries.push_back(Entry {
            hash,
            message: Message::new(role, text),
        });

        while inner.entries.len() > config.capacity() {
            inner.evict_oldest_pair();
            debug!("Evicted oldest message pair");
        }
        true
    }

    /// Render the last `config.history_size` messages as context text.
    #[must_use]
    pub fn window(&self, config: &HistoryConfig) -> String {
        let inner = self.read();
        let start = inner.entries.len().saturating_sub(config.history_size);
        let selected: Vec<&Message> = inner
            .entries
            .iter()
            .skip(start)
            .map(|e| &e.message)
            .collect();

        let mut parts = Vec::with_capacity(selected.len() * 2);
        for (i, msg) in selected.iter().enumerate() {
            parts.push(msg.sanitized_line());
            if msg.is_from(Role::Assistant) && i + 1 < selected.len() {
                parts.push(WINDOW_SEPARATOR.to_string());
            }
        }
        parts.join("\n")
    }

    /// Drop messages, keeping the hash index in step. Returns how many went.
    pub fn remove(&self, target: Removal<'_>) -> usize {
        let mut inner = self.write();
        let before = inner.entries.len();

        match target {
            Removal::Last(count) => {
                for _ in 0..count.min(before) {
                    if let Some(entry) = inner.entries.pop_back() {
                        inner.hashes.remove(&entry.hash);
                    }
                }
            }
            Removal::Containing(needle) => {
                let StoreInner { entries, hashes } = &mut *inner;
                entries.retain(|entry| {
                    let keep = !entry.message.text.contains(needle);
                    if !keep {
                        hashes.remove(&entry.hash);
                    }
                    keep
                });
            }
        }

        before - inner.entries.len()
    }

    /// Snapshot of the messages matching `predicate`.
    pub fn filter<P>(&self, predicate: P) -> Vec<Message>
    where
        P: Fn(&Message) -> bool,
    {
        self.read()
            .entries
            .iter()
            .map(|e| &e.message)
            .filter(|&m| predicate(m))
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<Message> {
        self.filter(|_| true)
    }

    #[must_use]
    pub fn stats(&self) -> HistoryStats {
        HistoryStats::from_messages(&self.snapshot())
    }

    pub fn clear(&self) {
        let mut inner = self.write();
        inner.entries.clear();
        inner.hashes.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.read().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().entries.is_empty()
    }
}

/// Statistics about conversation history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryStats {
    pub total_messages: usize,
    pub user_messages: usize,
    pub assistant_messages: usize,
    pub total_characters: usize,
    pub estimated_tokens: usize,
}

impl HistoryStats {
    #[must_use]
    pub fn from_messages(messages: &[Message]) -> Self {
        let total_chars: usize = messages.iter().map(|m| m.text.chars().count()).sum();
        Self {
            total_messages: messages.len(),
            user_messages: messages.iter().filter(|m| m.is_from(Role::User)).count(),
            assistant_messages: messages
                .iter()
                .filter(|m| m.is_from(Role::Assistant))
                .count(),
            total_characters: total_chars,
            estimated_tokens: total_chars / 4, // Rough estimate: 4 chars per token
        }
    }
}
