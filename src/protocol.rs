//! Protocol module
//!
//! Records exchanged with the backend:
//! - Message records appended to the feed
//! - Patches applied when a message is edited in place
//! - Typing status values
//! - Push notification payloads
//!
//! Field names match what the backend stores, so every type round-trips
//! through JSON unchanged.

use crate::Result;
use serde::{Deserialize, Serialize};

/// Body of a message as stored in the feed (the id is the record key)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageRecord {
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

impl MessageRecord {
    /// Create a fresh, unedited record stamped with the current time
    pub fn new(sender: &str, receiver: &str, content: &str) -> Self {
        Self {
            sender: sender.to_string(),
            receiver: receiver.to_string(),
            content: content.to_string(),
            timestamp: chrono::Utc::now().timestamp_millis(),
            edited: false,
        }
    }
}

/// Fields rewritten when a message is edited
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessagePatch {
    /// Replacement text
    pub content: String,
    /// Edit time, Unix milliseconds
    pub timestamp: i64,
    /// Always true for a patch
    pub edited: bool,
}

impl MessagePatch {
    /// Build an edit patch stamped with the current time
    pub fn edit(content: &str) -> Self {
        Self {
            content: content.to_string(),
            timestamp: chrono::Utc::now().timestamp_millis(),
            edited: true,
        }
    }
}

/// Typing presence value
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum TypingState {
    /// The user is composing
    #[serde(rename = "typing")]
    Typing,
    /// Cleared status
    #[default]
    #[serde(rename = "")]
    Idle,
}

impl TypingState {
    /// Wire value of this state
    pub fn as_str(&self) -> &'static str {
        match self {
            TypingState::Typing => "typing",
            TypingState::Idle => "",
        }
    }

    /// Parse a stored value; anything but `"typing"` counts as idle
    pub fn from_wire(value: &str) -> Self {
        if value == "typing" {
            TypingState::Typing
        } else {
            TypingState::Idle
        }
    }
}

/// Payload POSTed to the push gateway
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PushNotification {
    /// Recipient device push token
    pub to: String,
    /// Notification sound
    pub sound: String,
    /// Notification title
    pub title: String,
    /// Notification body
    pub body: String,
    /// Extra payload delivered to the app
    pub data: serde_json::Value,
}

impl PushNotification {
    /// Build the "new message" notification for a recipient token
    pub fn new_message(token: &str, sender_name: &str, record: &MessageRecord) -> Result<Self> {
        Ok(Self {
            to: token.to_string(),
            sound: "default".to_string(),
            title: format!("{} sent you a message", sender_name),
            body: record.content.clone(),
            data: serde_json::json!({ "messageData": serde_json::to_value(record)? }),
        })
    }
}
