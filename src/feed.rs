//! Message feed abstraction
//!
//! The feed is the store of record for every message of every conversation.
//! It supports append, point update, point delete, point read, range queries
//! ordered by arrival, and a standing subscription that yields the whole feed
//! after each change.

use crate::{
    protocol::{MessagePatch, MessageRecord},
    storage::{ConversationPair, Message},
    Result,
};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::watch;

/// Whole-feed snapshot in arrival order
pub type FeedSnapshot = Arc<Vec<Message>>;

/// Range query over the feed
///
/// Returns the newest `limit` records matching the filters, oldest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedQuery {
    /// Restrict to one conversation, or `None` for the whole feed
    pub pair: Option<ConversationPair>,
    /// Only records that arrived before this position
    pub before: Option<i64>,
    /// Maximum records returned
    pub limit: usize,
}

impl FeedQuery {
    /// Most recent `limit` records of a conversation
    pub fn latest(pair: ConversationPair, limit: usize) -> Self {
        Self {
            pair: Some(pair),
            before: None,
            limit,
        }
    }

    /// Up to `limit` records of a conversation older than `before`
    pub fn older_than(pair: ConversationPair, before: i64, limit: usize) -> Self {
        Self {
            pair: Some(pair),
            before: Some(before),
            limit,
        }
    }
}

/// Store of record for messages
#[async_trait]
pub trait FeedStore: Send + Sync {
    /// Append a record, returning the id the store assigned
    async fn push(&self, record: MessageRecord) -> Result<String>;

    /// Apply an edit to an existing record
    async fn update(&self, id: &str, patch: MessagePatch) -> Result<()>;

    /// Physically delete a record
    async fn remove(&self, id: &str) -> Result<()>;

    /// Read one record
    async fn get(&self, id: &str) -> Result<Option<Message>>;

    /// Run a range query
    async fn query(&self, query: &FeedQuery) -> Result<Vec<Message>>;

    /// Subscribe to whole-feed snapshots; the current snapshot is available immediately
    fn subscribe(&self) -> watch::Receiver<FeedSnapshot>;
}

/// Keep the records of one conversation, preserving arrival order
pub fn filter_conversation(snapshot: &[Message], pair: &ConversationPair) -> Vec<Message> {
    snapshot
        .iter()
        .filter(|message| pair.contains(message))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(id: &str, seq: i64, sender: &str, receiver: &str) -> Message {
        Message {
            id: id.to_string(),
            seq,
            sender: sender.to_string(),
            receiver: receiver.to_string(),
            content: format!("message {}", id),
            timestamp: 10 + seq,
            edited: false,
        }
    }

    #[test]
    fn test_filter_conversation_scenario() {
        let feed = vec![
            message("1", 1, "A", "B"),
            message("2", 2, "A", "C"),
            message("3", 3, "B", "A"),
        ];

        let filtered = filter_conversation(&feed, &ConversationPair::new("A", "B"));
        let ids: Vec<&str> = filtered.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "3"]);
    }

    #[test]
    fn test_filter_conversation_empty_feed() {
        assert!(filter_conversation(&[], &ConversationPair::new("A", "B")).is_empty());
    }
}
