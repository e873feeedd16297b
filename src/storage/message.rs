//! Message structures and conversation membership

use chrono::{Local, TimeZone};
use serde::{Deserialize, Serialize};

/// Represents a message materialized from the feed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    /// Record key assigned by the store on creation
    pub id: String,
    /// Arrival position in the feed, assigned by the store and never rewritten
    pub seq: i64,
    /// Author user id
    pub sender: String,
    /// Recipient user id
    pub receiver: String,
    /// Text body
    pub content: String,
    /// Creation or last-edit time, Unix milliseconds
    pub timestamp: i64,
    /// Whether the message was modified in place
    #[serde(default)]
    pub edited: bool,
}

impl Message {
    /// Whether `user_id` wrote this message
    pub fn is_authored_by(&self, user_id: &str) -> bool {
        self.sender == user_id
    }

    /// Pagination position of this message
    pub fn cursor(&self) -> Cursor {
        Cursor {
            id: self.id.clone(),
            seq: self.seq,
        }
    }

    /// Local wall-clock time of the timestamp, e.g. `14:03`
    pub fn display_time(&self) -> String {
        match Local.timestamp_millis_opt(self.timestamp).single() {
            Some(time) => time.format("%H:%M").to_string(),
            None => String::new(),
        }
    }
}

/// Position of the oldest loaded message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    /// Message id
    pub id: String,
    /// Arrival position of that message
    pub seq: i64,
}

/// Unordered pair of participants defining a two-party conversation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationPair {
    first: String,
    second: String,
}

impl ConversationPair {
    /// Create a pair; argument order does not matter
    pub fn new(a: &str, b: &str) -> Self {
        let (first, second) = if a <= b { (a, b) } else { (b, a) };
        Self {
            first: first.to_string(),
            second: second.to_string(),
        }
    }

    /// The two participants in canonical order
    pub fn participants(&self) -> (&str, &str) {
        (&self.first, &self.second)
    }

    /// Whether a sender/receiver combination belongs to this conversation
    pub fn matches(&self, sender: &str, receiver: &str) -> bool {
        (sender == self.first && receiver == self.second)
            || (sender == self.second && receiver == self.first)
    }

    /// Whether a message belongs to this conversation
    pub fn contains(&self, message: &Message) -> bool {
        self.matches(&message.sender, &message.receiver)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_is_unordered() {
        assert_eq!(ConversationPair::new("a", "b"), ConversationPair::new("b", "a"));
        let pair = ConversationPair::new("b", "a");
        assert!(pair.matches("a", "b"));
        assert!(pair.matches("b", "a"));
        assert!(!pair.matches("a", "c"));
        assert!(!pair.matches("a", "a"));
    }

    #[test]
    fn test_self_conversation() {
        let pair = ConversationPair::new("a", "a");
        assert!(pair.matches("a", "a"));
        assert!(!pair.matches("a", "b"));
    }
}
