//! Convsync - two-party conversation sync over a shared message feed
//!
//! This library keeps an ordered, de-duplicated view of a one-to-one chat
//! current with a remote append/update/delete feed. It provides backward
//! pagination, in-place edit and confirmed delete, debounced typing presence,
//! and best-effort push notifications to the counterparty.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod conversation;
pub mod directory;
pub mod feed;
pub mod i18n;
pub mod presence;
pub mod protocol;
pub mod push;
pub mod storage;

/// Result type alias for Convsync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Convsync operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Local storage or configuration error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Message feed read/write error
    #[error("Feed error: {0}")]
    Feed(String),

    /// Typing presence read/write error
    #[error("Presence error: {0}")]
    Presence(String),

    /// Push gateway error
    #[error("Push error: {0}")]
    Push(String),

    /// Referenced record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Edit or delete attempted on a message authored by someone else
    #[error("User {user} is not the author of message {message_id}")]
    NotAuthor {
        /// Acting user
        user: String,
        /// Target message
        message_id: String,
    },

    /// Send attempted with blank input
    #[error("Message is empty")]
    EmptyMessage,

    /// General I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    JsonSerialization(#[from] serde_json::Error),

    /// SQLite database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Initialize logging for the Convsync library
///
/// Honors `RUST_LOG`, defaulting to `info`. Safe to call more than once.
pub fn init() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

#[cfg(test)]
mod tests;
