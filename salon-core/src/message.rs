// ABOUTME: Immutable chat message records and the discussions built from them
// ABOUTME: A Discussion is a non-empty, time-ordered run of messages

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One captured chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub timestamp: DateTime<Utc>,
    pub author: String,
    pub content: String,
    pub channel: String,
}

impl Message {
    pub fn new(
        timestamp: DateTime<Utc>,
        author: impl Into<String>,
        content: impl Into<String>,
        channel: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            author: author.into(),
            content: content.into(),
            channel: channel.into(),
        }
    }
}

/// Sort messages ascending by timestamp, keeping the relative order of ties
pub fn sort_chronologically(messages: &mut [Message]) {
    messages.sort_by_key(|m| m.timestamp);
}

/// A contiguous run of messages with no internal gap above the segmentation threshold.
///
/// Only the segmenter builds these, so a `Discussion` is never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discussion {
    messages: Vec<Message>,
}

impl Discussion {
    pub(crate) fn start(first: Message) -> Self {
        Self {
            messages: vec![first],
        }
    }

    pub(crate) fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Always false; kept for API symmetry with `len`
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn first(&self) -> &Message {
        &self.messages[0]
    }

    pub fn last(&self) -> &Message {
        &self.messages[self.messages.len() - 1]
    }

    /// Time between the first and last message
    pub fn duration(&self) -> chrono::Duration {
        self.last().timestamp - self.first().timestamp
    }

    /// Distinct authors in order of first appearance
    pub fn participants(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for m in &self.messages {
            if !seen.contains(&m.author.as_str()) {
                seen.push(&m.author);
            }
        }
        seen
    }

    /// Message bodies in order
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.messages.iter().map(|m| m.content.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(minute: i64, author: &str) -> Message {
        let base = DateTime::from_timestamp(1_720_000_000, 0).unwrap();
        Message::new(
            base + chrono::Duration::minutes(minute),
            author,
            format!("message at {}", minute),
            "!general:example.com",
        )
    }

    #[test]
    fn test_sort_chronologically_is_stable() {
        let mut msgs = vec![at(5, "b"), at(1, "a"), at(5, "c")];
        sort_chronologically(&mut msgs);
        let authors: Vec<_> = msgs.iter().map(|m| m.author.as_str()).collect();
        assert_eq!(authors, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_discussion_accessors() {
        let mut d = Discussion::start(at(0, "alice"));
        d.push(at(3, "bob"));
        d.push(at(10, "alice"));

        assert_eq!(d.len(), 3);
        assert!(!d.is_empty());
        assert_eq!(d.first().author, "alice");
        assert_eq!(d.last().timestamp - d.first().timestamp, d.duration());
        assert_eq!(d.duration(), chrono::Duration::minutes(10));
        assert_eq!(d.participants(), vec!["alice", "bob"]);
        assert_eq!(d.texts().count(), 3);
    }
}
