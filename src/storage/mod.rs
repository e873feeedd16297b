//! Local storage module
//!
//! - `message` - Message structures, conversation pairs and cursors
//! - `settings` - Application settings and configuration
//! - `backend` - SQLite store of record for the feed, presence, users and push tokens

pub mod backend;
pub mod message;
pub mod settings;

pub use backend::Backend;
pub use message::{ConversationPair, Cursor, Message};
pub use settings::Settings;
