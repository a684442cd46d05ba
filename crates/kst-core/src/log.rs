//! Bounded, ordered message log.

use std::collections::VecDeque;

use kst_proto::ChatMessage;

/// Default number of messages retained.
pub const DEFAULT_MESSAGE_CAPACITY: usize = 1000;

/// Messages in display order, oldest first.
///
/// Live messages are appended; history batches are spliced in front of
/// everything already held. When full, the oldest entries go first.
#[derive(Debug, Clone)]
pub struct MessageLog {
    entries: VecDeque<ChatMessage>,
    capacity: usize,
}

impl MessageLog {
    /// Empty log holding at most `capacity` messages (minimum one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { entries: VecDeque::with_capacity(capacity.min(DEFAULT_MESSAGE_CAPACITY)), capacity }
    }

    /// Add a message at the end.
    pub fn append(&mut self, message: ChatMessage) {
        self.entries.push_back(message);
        self.evict();
    }

    /// Splice a history batch (already in display order) before existing messages.
    pub fn prepend(&mut self, batch: Vec<ChatMessage>) {
        for message in batch.into_iter().rev() {
            self.entries.push_front(message);
        }
        self.evict();
    }

    /// Messages oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &ChatMessage> {
        self.entries.iter()
    }

    /// Most recent message.
    pub fn latest(&self) -> Option<&ChatMessage> {
        self.entries.back()
    }

    /// Number of messages held.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Nothing logged yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every message.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn evict(&mut self) {
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }
}

impl Default for MessageLog {
    fn default() -> Self {
        Self::new(DEFAULT_MESSAGE_CAPACITY)
    }
}

/// Order a history batch by time of day. Equal times keep arrival order.
pub fn sort_history(batch: &mut [ChatMessage]) {
    batch.sort_by_key(|m| m.time().minutes_since_midnight());
}
