//! libSQL-backed chat store.
//!
//! Persists users and messages in a local libSQL/SQLite database. Timestamps
//! are stored as fixed-width RFC 3339 text (microsecond precision, `Z`
//! suffix) so that ordering by the column is chronological.
//! Username search folds case in Rust rather than with `LIKE`, which only
//! handles ASCII.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use libsql::{Connection, Database, Row};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use super::{next_timestamp, ChatStore, StoreError};
use crate::types::{Message, MessageType, NewMessage, UserRecord};

/// SQL schema for the chat store.
pub const CHAT_SCHEMA: &str = r#"
-- Known users; username and email are both unique handles
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    username TEXT NOT NULL UNIQUE,
    email TEXT NOT NULL UNIQUE,
    is_online INTEGER NOT NULL DEFAULT 0,
    last_seen TEXT NOT NULL
);

-- One row per chat message
CREATE TABLE IF NOT EXISTS messages (
    -- UUID v7 (time-sortable)
    id TEXT PRIMARY KEY,
    sender TEXT NOT NULL CHECK (length(sender) > 0),
    recipient TEXT NOT NULL CHECK (length(recipient) > 0),
    content TEXT NOT NULL CHECK (length(content) > 0),
    message_type TEXT NOT NULL DEFAULT 'text'
        CHECK (message_type IN ('text', 'image', 'file')),
    timestamp TEXT NOT NULL,
    is_read INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_messages_sender
    ON messages(sender, timestamp DESC);

CREATE INDEX IF NOT EXISTS idx_messages_recipient
    ON messages(recipient, timestamp DESC);
"#;

const MESSAGE_COLUMNS: &str =
    "id, sender, recipient, content, message_type, timestamp, is_read";

const USER_COLUMNS: &str = "id, username, email, is_online, last_seen";

/// libSQL chat store.
///
/// For in-memory databases every query must go through the same connection,
/// so a single connection is shared behind a mutex.
#[derive(Clone)]
pub struct LibSqlChatStore {
    conn: Arc<Mutex<Connection>>,
    last_timestamp: Arc<Mutex<Option<DateTime<Utc>>>>,
    initialized: Arc<AtomicBool>,
    // Keeps the database alive as long as the store when we opened it ourselves.
    _db: Option<Arc<Database>>,
}

impl LibSqlChatStore {
    /// Create a store over an existing connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            last_timestamp: Arc::new(Mutex::new(None)),
            initialized: Arc::new(AtomicBool::new(false)),
            _db: None,
        }
    }

    /// Open a fresh in-memory database and initialize the schema.
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        let db = libsql::Builder::new_local(":memory:").build().await?;
        Self::from_database(db).await
    }

    /// Open (or create) a database file and initialize the schema.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub async fn open_local(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Database(format!("Failed to create database directory: {}", e))
            })?;
        }

        let db = libsql::Builder::new_local(path).build().await?;
        info!("Opened chat database at {:?}", path);
        Self::from_database(db).await
    }

    async fn from_database(db: Database) -> Result<Self, StoreError> {
        let conn = db.connect()?;
        let mut store = Self::new(conn);
        store._db = Some(Arc::new(db));
        store.initialize().await?;
        Ok(store)
    }

    /// Initialize the database schema if not already done.
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> Result<(), StoreError> {
        if self.initialized.load(Ordering::Acquire) {
            return Ok(());
        }

        let conn = self.conn.lock().await;
        conn.execute_batch(CHAT_SCHEMA).await?;

        // Resume the timestamp sequence after the newest persisted message.
        let mut rows = conn
            .query(
                "SELECT timestamp FROM messages ORDER BY timestamp DESC LIMIT 1",
                (),
            )
            .await?;
        if let Some(row) = rows.next().await? {
            let newest: String = row.get(0)?;
            *self.last_timestamp.lock().await = Some(parse_timestamp(&newest)?);
        }

        self.initialized.store(true, Ordering::Release);
        debug!("Chat store schema initialized");

        Ok(())
    }

    async fn query_messages(
        &self,
        sql: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<Vec<Message>, StoreError> {
        self.initialize().await?;

        let conn = self.conn.lock().await;
        let mut rows = conn.query(sql, params).await?;
        let mut messages = Vec::new();
        while let Some(row) = rows.next().await? {
            messages.push(row_to_message(&row)?);
        }
        Ok(messages)
    }
}

#[async_trait]
impl ChatStore for LibSqlChatStore {
    #[instrument(skip(self))]
    async fn upsert_identity(
        &self,
        username: &str,
        email: &str,
    ) -> Result<UserRecord, StoreError> {
        self.initialize().await?;

        // Holding the connection for the whole lookup-then-write keeps the
        // upsert atomic with respect to other store calls.
        let conn = self.conn.lock().await;

        let mut rows = conn
            .query(
                &format!(
                    "SELECT {USER_COLUMNS} FROM users WHERE username = ?1 OR email = ?2 LIMIT 1"
                ),
                libsql::params![username, email],
            )
            .await?;

        if let Some(row) = rows.next().await? {
            let mut user = row_to_user(&row)?;
            conn.execute(
                "UPDATE users SET is_online = 1 WHERE id = ?1",
                libsql::params![user.id.as_str()],
            )
            .await?;
            user.is_online = true;
            return Ok(user);
        }

        let user = UserRecord {
            id: Uuid::now_v7().to_string(),
            username: username.to_string(),
            email: email.to_string(),
            is_online: true,
            last_seen: Utc::now(),
        };

        conn.execute(
            "INSERT INTO users (id, username, email, is_online, last_seen) VALUES (?1, ?2, ?3, 1, ?4)",
            libsql::params![
                user.id.as_str(),
                username,
                email,
                format_timestamp(&user.last_seen)
            ],
        )
        .await?;

        debug!(id = %user.id, "Created user");
        Ok(user)
    }

    async fn find_identities(&self, query: &str) -> Result<Vec<UserRecord>, StoreError> {
        self.initialize().await?;

        let needle = query.to_lowercase();

        let conn = self.conn.lock().await;
        let mut rows = conn
            .query(
                &format!("SELECT {USER_COLUMNS} FROM users ORDER BY username"),
                (),
            )
            .await?;

        let mut users = Vec::new();
        while let Some(row) = rows.next().await? {
            let user = row_to_user(&row)?;
            if user.username.to_lowercase().contains(&needle) {
                users.push(user);
            }
        }
        Ok(users)
    }

    #[instrument(skip(self, message), fields(sender = %message.sender, recipient = %message.recipient))]
    async fn append_message(&self, message: NewMessage) -> Result<Message, StoreError> {
        self.initialize().await?;

        let conn = self.conn.lock().await;
        let timestamp = {
            let mut last = self.last_timestamp.lock().await;
            next_timestamp(&mut last)
        };
        let id = Uuid::now_v7().to_string();

        conn.execute(
            r#"
            INSERT INTO messages (id, sender, recipient, content, message_type, timestamp, is_read)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0)
            "#,
            libsql::params![
                id.as_str(),
                message.sender.as_str(),
                message.recipient.as_str(),
                message.content.as_str(),
                message.message_type.as_str(),
                format_timestamp(&timestamp)
            ],
        )
        .await
        .map_err(|e| match e {
            libsql::Error::SqliteFailure(_, reason) => StoreError::Rejected(reason),
            other => StoreError::from(other),
        })?;

        debug!(id = %id, "Message stored");

        Ok(Message {
            id,
            sender: message.sender,
            recipient: message.recipient,
            content: message.content,
            message_type: message.message_type,
            timestamp,
            is_read: false,
        })
    }

    async fn messages_between(&self, a: &str, b: &str) -> Result<Vec<Message>, StoreError> {
        self.query_messages(
            &format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages \
                 WHERE (sender = ?1 AND recipient = ?2) OR (sender = ?2 AND recipient = ?1) \
                 ORDER BY timestamp ASC"
            ),
            libsql::params![a, b],
        )
        .await
    }

    async fn messages_involving(&self, identity: &str) -> Result<Vec<Message>, StoreError> {
        self.query_messages(
            &format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages \
                 WHERE sender = ?1 OR recipient = ?1 \
                 ORDER BY timestamp DESC"
            ),
            libsql::params![identity],
        )
        .await
    }

    async fn set_online_status(
        &self,
        identity: &str,
        is_online: bool,
        last_seen: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.initialize().await?;

        let conn = self.conn.lock().await;
        conn.execute(
            "UPDATE users SET is_online = ?1, last_seen = ?2 WHERE username = ?3",
            libsql::params![i64::from(is_online), format_timestamp(&last_seen), identity],
        )
        .await?;
        Ok(())
    }
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::InvalidRecord(format!("bad timestamp {value:?}: {e}")))
}

fn row_to_message(row: &Row) -> Result<Message, StoreError> {
    let message_type: String = row.get(4)?;
    let timestamp: String = row.get(5)?;
    let is_read: i64 = row.get(6)?;

    Ok(Message {
        id: row.get(0)?,
        sender: row.get(1)?,
        recipient: row.get(2)?,
        content: row.get(3)?,
        message_type: message_type
            .parse::<MessageType>()
            .map_err(StoreError::InvalidRecord)?,
        timestamp: parse_timestamp(&timestamp)?,
        is_read: is_read != 0,
    })
}

fn row_to_user(row: &Row) -> Result<UserRecord, StoreError> {
    let is_online: i64 = row.get(3)?;
    let last_seen: String = row.get(4)?;

    Ok(UserRecord {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        is_online: is_online != 0,
        last_seen: parse_timestamp(&last_seen)?,
    })
}
