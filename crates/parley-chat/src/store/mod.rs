//! Persistent store collaborator.
//!
//! The kernel never owns users or messages; it reaches them through the
//! [`ChatStore`] trait. Two backends are provided:
//! - [`InMemoryChatStore`] for tests and ephemeral deployments
//! - [`LibSqlChatStore`] for durable storage in a libSQL/SQLite database

mod libsql_store;
mod memory;

pub use libsql_store::{LibSqlChatStore, CHAT_SCHEMA};
pub use memory::InMemoryChatStore;

use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, TimeDelta, Utc};
use thiserror::Error;

use crate::types::{Message, NewMessage, UserRecord};

/// Errors that can occur during store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Rejected write: {0}")]
    Rejected(String),
}

impl From<libsql::Error> for StoreError {
    fn from(e: libsql::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

/// Trait for chat persistence backends.
///
/// Implementations assign message ids and timestamps. Timestamps handed out
/// by one store instance are strictly increasing.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Find a user by username or email, creating it when neither matches.
    ///
    /// The returned user is marked online.
    async fn upsert_identity(&self, username: &str, email: &str)
        -> Result<UserRecord, StoreError>;

    /// Case-insensitive substring search over usernames.
    async fn find_identities(&self, query: &str) -> Result<Vec<UserRecord>, StoreError>;

    /// Persist a new message, assigning its id and timestamp.
    async fn append_message(&self, message: NewMessage) -> Result<Message, StoreError>;

    /// All messages exchanged between `a` and `b`, oldest first.
    async fn messages_between(&self, a: &str, b: &str) -> Result<Vec<Message>, StoreError>;

    /// All messages sent or received by `identity`, newest first.
    async fn messages_involving(&self, identity: &str) -> Result<Vec<Message>, StoreError>;

    /// Record a user's online state.
    ///
    /// Unknown identities are ignored.
    async fn set_online_status(
        &self,
        identity: &str,
        is_online: bool,
        last_seen: DateTime<Utc>,
    ) -> Result<(), StoreError>;
}

/// Next message timestamp, strictly after `last`.
///
/// Timestamps are kept at microsecond precision so they survive the RFC 3339
/// round trip through SQL unchanged.
pub(crate) fn next_timestamp(last: &mut Option<DateTime<Utc>>) -> DateTime<Utc> {
    let mut now = Utc::now().trunc_subsecs(6);
    if let Some(previous) = *last {
        if now <= previous {
            now = previous + TimeDelta::microseconds(1);
        }
    }
    *last = Some(now);
    now
}
