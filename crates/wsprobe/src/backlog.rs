//! Bounded retention of the most recent inbound messages.

use std::collections::VecDeque;

/// Number of message records a backlog keeps
pub const RESPONSE_BACKLOG_CAPACITY: usize = 25;

/// One captured inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRecord {
    /// Sequence number within the session (starts at 1)
    pub sequence: u64,
    /// Raw message text
    pub text: String,
}

impl MessageRecord {
    /// Render as it appears in the response data
    #[must_use]
    pub fn render(&self) -> String {
        format!("[Message {}]\n{}\n\n", self.sequence, self.text)
    }
}

/// FIFO of message records, oldest evicted first
#[derive(Debug, Clone)]
pub struct ResponseBacklog {
    records: VecDeque<MessageRecord>,
    capacity: usize,
}

impl Default for ResponseBacklog {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseBacklog {
    /// Create a backlog with the standard capacity
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(RESPONSE_BACKLOG_CAPACITY)
    }

    /// Create a backlog holding at most `capacity` records (minimum 1)
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a record, evicting the oldest ones while full
    pub fn push(&mut self, sequence: u64, text: &str) {
        while self.records.len() >= self.capacity {
            let _ = self.records.pop_front();
        }
        self.records.push_back(MessageRecord {
            sequence,
            text: text.to_string(),
        });
    }

    /// Concatenate all retained records in arrival order
    #[must_use]
    pub fn render(&self) -> String {
        self.records.iter().map(MessageRecord::render).collect()
    }

    /// Sequence number of the oldest retained record
    #[must_use]
    pub fn oldest_sequence(&self) -> Option<u64> {
        self.records.front().map(|r| r.sequence)
    }

    /// Iterate retained records, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &MessageRecord> {
        self.records.iter()
    }

    /// Drop every record
    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Number of retained records
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether nothing is retained
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Maximum number of retained records
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_render_format() {
        let mut backlog = ResponseBacklog::new();
        backlog.push(1, "CONNECTED\nversion:1.1");
        assert_eq!(backlog.render(), "[Message 1]\nCONNECTED\nversion:1.1\n\n");
    }

    #[test]
    fn test_eviction_after_capacity() {
        let mut backlog = ResponseBacklog::new();
        for seq in 1..=26 {
            backlog.push(seq, &format!("msg-{seq}"));
        }
        assert_eq!(backlog.len(), RESPONSE_BACKLOG_CAPACITY);
        assert_eq!(backlog.oldest_sequence(), Some(2));
        let rendered = backlog.render();
        assert!(!rendered.contains("[Message 1]\n"));
        assert!(rendered.starts_with("[Message 2]\nmsg-2"));
        assert!(rendered.ends_with("[Message 26]\nmsg-26\n\n"));
    }

    #[test]
    fn test_clear() {
        let mut backlog = ResponseBacklog::with_capacity(3);
        backlog.push(1, "a");
        backlog.clear();
        assert!(backlog.is_empty());
        assert_eq!(backlog.render(), "");
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let mut backlog = ResponseBacklog::with_capacity(0);
        backlog.push(1, "a");
        backlog.push(2, "b");
        assert_eq!(backlog.capacity(), 1);
        assert_eq!(backlog.oldest_sequence(), Some(2));
    }

    proptest! {
        #[test]
        fn prop_bounded_and_ordered(count in 0u64..80) {
            let mut backlog = ResponseBacklog::new();
            for seq in 1..=count {
                backlog.push(seq, "x");
            }
            prop_assert!(backlog.len() <= RESPONSE_BACKLOG_CAPACITY);
            let seqs: Vec<u64> = backlog.iter().map(|r| r.sequence).collect();
            let expected_first = count.saturating_sub(RESPONSE_BACKLOG_CAPACITY as u64) + 1;
            let expected: Vec<u64> = (expected_first..=count).collect();
            prop_assert_eq!(seqs, expected);
        }
    }
}
