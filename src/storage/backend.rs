//! SQLite-based backend
//!
//! A local store of record implementing the feed, presence, directory and
//! push-token interfaces. Every feed mutation republishes the whole feed to
//! subscribers, and every presence write notifies the watchers of that key.

use crate::{
    directory::{PushTokenStore, User, UserDirectory},
    feed::{FeedQuery, FeedSnapshot, FeedStore},
    presence::PresenceStore,
    protocol::{MessagePatch, MessageRecord, TypingState},
    storage::message::Message,
    Error, Result,
};
use async_trait::async_trait;
use rusqlite::{params, params_from_iter, types::Value, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tracing::{debug, info};

type PresenceKey = (String, String);

/// SQLite-based backend
pub struct Backend {
    conn: Mutex<Connection>,
    feed_tx: watch::Sender<FeedSnapshot>,
    typing_tx: Mutex<HashMap<PresenceKey, watch::Sender<TypingState>>>,
}

impl Backend {
    /// Open or create a backend database file
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)
            .map_err(|e| Error::Storage(format!("Failed to open database: {}", e)))?;
        info!("Opened backend database at {}", path.display());
        Self::with_connection(conn)
    }

    /// Create an in-memory backend (for testing)
    pub fn new_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Storage(format!("Failed to create in-memory database: {}", e)))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        init_schema(&conn)?;
        let snapshot = load_feed(&conn)?;
        let (feed_tx, _) = watch::channel(Arc::new(snapshot));

        Ok(Self {
            conn: Mutex::new(conn),
            feed_tx,
            typing_tx: Mutex::new(HashMap::new()),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Storage("Database connection lock poisoned".to_string()))
    }

    fn publish_feed(&self, conn: &Connection) -> Result<()> {
        let snapshot = load_feed(conn)?;
        debug!("Publishing feed snapshot with {} records", snapshot.len());
        self.feed_tx.send_replace(Arc::new(snapshot));
        Ok(())
    }

    fn typing_sender(&self, key: PresenceKey, initial: TypingState) -> Result<watch::Sender<TypingState>> {
        let mut senders = self
            .typing_tx
            .lock()
            .map_err(|_| Error::Presence("Presence lock poisoned".to_string()))?;
        Ok(senders
            .entry(key)
            .or_insert_with(|| watch::channel(initial).0)
            .clone())
    }
}

/// Initialize database schema
fn init_schema(conn: &Connection) -> Result<()> {
    // Seq is the arrival position; AUTOINCREMENT keeps it from being reused after deletes
    conn.execute(
        "CREATE TABLE IF NOT EXISTS messages (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT NOT NULL UNIQUE,
            sender TEXT NOT NULL,
            receiver TEXT NOT NULL,
            content TEXT NOT NULL,
            timestamp INTEGER NOT NULL,
            edited INTEGER NOT NULL DEFAULT 0
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_messages_pair ON messages(sender, receiver)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS typing_status (
            typist TEXT NOT NULL,
            audience TEXT NOT NULL,
            status TEXT NOT NULL,
            PRIMARY KEY (typist, audience)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT NOT NULL,
            push_token TEXT
        )",
        [],
    )?;

    Ok(())
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        seq: row.get(0)?,
        id: row.get(1)?,
        sender: row.get(2)?,
        receiver: row.get(3)?,
        content: row.get(4)?,
        timestamp: row.get(5)?,
        edited: row.get::<_, i64>(6)? != 0,
    })
}

fn load_feed(conn: &Connection) -> Result<Vec<Message>> {
    let mut stmt = conn.prepare(
        "SELECT seq, id, sender, receiver, content, timestamp, edited FROM messages ORDER BY seq ASC",
    )?;
    let rows = stmt.query_map([], row_to_message)?;

    let mut messages = Vec::new();
    for row in rows {
        messages.push(row?);
    }
    Ok(messages)
}

#[async_trait]
impl FeedStore for Backend {
    async fn push(&self, record: MessageRecord) -> Result<String> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO messages (id, sender, receiver, content, timestamp, edited)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                id,
                record.sender,
                record.receiver,
                record.content,
                record.timestamp,
                record.edited as i32,
            ],
        )?;
        debug!("Pushed message {} from {} to {}", id, record.sender, record.receiver);
        self.publish_feed(&conn)?;
        Ok(id)
    }

    async fn update(&self, id: &str, patch: MessagePatch) -> Result<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE messages SET content = ?1, timestamp = ?2, edited = ?3 WHERE id = ?4",
            params![patch.content, patch.timestamp, patch.edited as i32, id],
        )?;
        if updated == 0 {
            return Err(Error::NotFound(format!("message {}", id)));
        }
        self.publish_feed(&conn)
    }

    async fn remove(&self, id: &str) -> Result<()> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM messages WHERE id = ?1", params![id])?;
        if deleted == 0 {
            return Err(Error::NotFound(format!("message {}", id)));
        }
        self.publish_feed(&conn)
    }

    async fn get(&self, id: &str) -> Result<Option<Message>> {
        let conn = self.conn()?;
        let message = conn
            .query_row(
                "SELECT seq, id, sender, receiver, content, timestamp, edited FROM messages WHERE id = ?1",
                params![id],
                row_to_message,
            )
            .optional()?;
        Ok(message)
    }

    async fn query(&self, query: &FeedQuery) -> Result<Vec<Message>> {
        let mut sql = String::from(
            "SELECT seq, id, sender, receiver, content, timestamp, edited FROM messages WHERE 1 = 1",
        );
        let mut args: Vec<Value> = Vec::new();

        if let Some(pair) = &query.pair {
            let (a, b) = pair.participants();
            sql.push_str(" AND ((sender = ? AND receiver = ?) OR (sender = ? AND receiver = ?))");
            args.extend([a, b, b, a].map(|s| Value::Text(s.to_string())));
        }
        if let Some(before) = query.before {
            sql.push_str(" AND seq < ?");
            args.push(Value::Integer(before));
        }
        sql.push_str(" ORDER BY seq DESC LIMIT ?");
        args.push(Value::Integer(query.limit as i64));

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(args), row_to_message)?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        messages.reverse();
        Ok(messages)
    }

    fn subscribe(&self) -> watch::Receiver<FeedSnapshot> {
        self.feed_tx.subscribe()
    }
}

#[async_trait]
impl PresenceStore for Backend {
    async fn set_typing(&self, typist: &str, audience: &str, state: TypingState) -> Result<()> {
        {
            let conn = self.conn()?;
            conn.execute(
                "INSERT OR REPLACE INTO typing_status (typist, audience, status) VALUES (?1, ?2, ?3)",
                params![typist, audience, state.as_str()],
            )?;
        }
        let tx = self.typing_sender((typist.to_string(), audience.to_string()), state)?;
        tx.send_replace(state);
        Ok(())
    }

    async fn typing(&self, typist: &str, audience: &str) -> Result<TypingState> {
        let conn = self.conn()?;
        let status: Option<String> = conn
            .query_row(
                "SELECT status FROM typing_status WHERE typist = ?1 AND audience = ?2",
                params![typist, audience],
                |row| row.get(0),
            )
            .optional()?;
        Ok(status.map(|s| TypingState::from_wire(&s)).unwrap_or_default())
    }

    fn subscribe_typing(&self, typist: &str, audience: &str) -> watch::Receiver<TypingState> {
        let initial = self
            .conn()
            .ok()
            .and_then(|conn| {
                conn.query_row(
                    "SELECT status FROM typing_status WHERE typist = ?1 AND audience = ?2",
                    params![typist, audience],
                    |row| row.get::<_, String>(0),
                )
                .optional()
                .ok()
                .flatten()
            })
            .map(|s| TypingState::from_wire(&s))
            .unwrap_or_default();

        match self.typing_sender((typist.to_string(), audience.to_string()), initial) {
            Ok(tx) => tx.subscribe(),
            // Without the registry the subscriber only ever sees the stored value
            Err(_) => watch::channel(initial).1,
        }
    }
}

#[async_trait]
impl UserDirectory for Backend {
    async fn register_user(&self, user: User) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO users (id, name, email) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET name = excluded.name, email = excluded.email",
            params![user.id, user.name, user.email],
        )?;
        Ok(())
    }

    async fn user(&self, id: &str) -> Result<Option<User>> {
        let conn = self.conn()?;
        let user = conn
            .query_row(
                "SELECT id, name, email FROM users WHERE id = ?1",
                params![id],
                |row| {
                    Ok(User {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        email: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(user)
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT id, name, email FROM users ORDER BY name ASC")?;
        let rows = stmt.query_map([], |row| {
            Ok(User {
                id: row.get(0)?,
                name: row.get(1)?,
                email: row.get(2)?,
            })
        })?;

        let mut users = Vec::new();
        for row in rows {
            users.push(row?);
        }
        Ok(users)
    }
}

#[async_trait]
impl PushTokenStore for Backend {
    async fn register_push_token(&self, user_id: &str, token: &str) -> Result<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE users SET push_token = ?1 WHERE id = ?2",
            params![token, user_id],
        )?;
        if updated == 0 {
            return Err(Error::NotFound(format!("user {}", user_id)));
        }
        Ok(())
    }

    async fn push_token(&self, user_id: &str) -> Result<Option<String>> {
        let conn = self.conn()?;
        let token: Option<Option<String>> = conn
            .query_row(
                "SELECT push_token FROM users WHERE id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(token.flatten())
    }
}
