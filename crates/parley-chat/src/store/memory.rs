//! In-memory chat store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, instrument};
use uuid::Uuid;

use super::{next_timestamp, ChatStore, StoreError};
use crate::types::{Message, NewMessage, UserRecord};

/// Volatile store backed by plain vectors.
///
/// State lives only as long as the process.
#[derive(Debug, Default)]
pub struct InMemoryChatStore {
    inner: RwLock<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    users: Vec<UserRecord>,
    messages: Vec<Message>,
    last_timestamp: Option<DateTime<Utc>>,
}

impl InMemoryChatStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of persisted messages.
    pub async fn message_count(&self) -> usize {
        self.inner.read().await.messages.len()
    }
}

#[async_trait]
impl ChatStore for InMemoryChatStore {
    #[instrument(skip(self))]
    async fn upsert_identity(
        &self,
        username: &str,
        email: &str,
    ) -> Result<UserRecord, StoreError> {
        let mut inner = self.inner.write().await;

        if let Some(user) = inner
            .users
            .iter_mut()
            .find(|u| u.username == username || u.email == email)
        {
            user.is_online = true;
            return Ok(user.clone());
        }

        let user = UserRecord {
            id: Uuid::now_v7().to_string(),
            username: username.to_string(),
            email: email.to_string(),
            is_online: true,
            last_seen: Utc::now(),
        };
        inner.users.push(user.clone());
        debug!(id = %user.id, "Created user");
        Ok(user)
    }

    async fn find_identities(&self, query: &str) -> Result<Vec<UserRecord>, StoreError> {
        let needle = query.to_lowercase();
        let inner = self.inner.read().await;
        Ok(inner
            .users
            .iter()
            .filter(|u| u.username.to_lowercase().contains(&needle))
            .cloned()
            .collect())
    }

    #[instrument(skip(self, message), fields(sender = %message.sender, recipient = %message.recipient))]
    async fn append_message(&self, message: NewMessage) -> Result<Message, StoreError> {
        if message.sender.is_empty() || message.recipient.is_empty() || message.content.is_empty()
        {
            return Err(StoreError::Rejected(
                "sender, recipient and content are required".to_string(),
            ));
        }

        let mut inner = self.inner.write().await;
        let timestamp = next_timestamp(&mut inner.last_timestamp);
        let stored = Message {
            id: Uuid::now_v7().to_string(),
            sender: message.sender,
            recipient: message.recipient,
            content: message.content,
            message_type: message.message_type,
            timestamp,
            is_read: false,
        };
        inner.messages.push(stored.clone());
        debug!(id = %stored.id, "Message stored");
        Ok(stored)
    }

    async fn messages_between(&self, a: &str, b: &str) -> Result<Vec<Message>, StoreError> {
        let inner = self.inner.read().await;
        let mut messages: Vec<Message> = inner
            .messages
            .iter()
            .filter(|m| {
                (m.sender == a && m.recipient == b) || (m.sender == b && m.recipient == a)
            })
            .cloned()
            .collect();
        messages.sort_by_key(|m| m.timestamp);
        Ok(messages)
    }

    async fn messages_involving(&self, identity: &str) -> Result<Vec<Message>, StoreError> {
        let inner = self.inner.read().await;
        let mut messages: Vec<Message> = inner
            .messages
            .iter()
            .filter(|m| m.sender == identity || m.recipient == identity)
            .cloned()
            .collect();
        messages.sort_by(|x, y| y.timestamp.cmp(&x.timestamp));
        Ok(messages)
    }

    async fn set_online_status(
        &self,
        identity: &str,
        is_online: bool,
        last_seen: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if let Some(user) = inner.users.iter_mut().find(|u| u.username == identity) {
            user.is_online = is_online;
            user.last_seen = last_seen;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upsert_creates_then_reuses() {
        let store = InMemoryChatStore::new();

        let created = store.upsert_identity("alice", "alice@example.com").await.unwrap();
        assert!(created.is_online);

        // Matching on email alone returns the same user
        let again = store.upsert_identity("alice2", "alice@example.com").await.unwrap();
        assert_eq!(again.id, created.id);
        assert_eq!(again.username, "alice");
    }

    #[tokio::test]
    async fn test_find_identities_case_insensitive() {
        let store = InMemoryChatStore::new();
        store.upsert_identity("Alice", "a@example.com").await.unwrap();
        store.upsert_identity("bob", "b@example.com").await.unwrap();

        let found = store.find_identities("ALI").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].username, "Alice");

        assert_eq!(store.find_identities("").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_append_rejects_empty_content() {
        let store = InMemoryChatStore::new();
        let result = store.append_message(NewMessage::text("alice", "bob", "")).await;
        assert!(matches!(result, Err(StoreError::Rejected(_))));
        assert_eq!(store.message_count().await, 0);
    }

    #[tokio::test]
    async fn test_history_ordering() {
        let store = InMemoryChatStore::new();
        store.append_message(NewMessage::text("alice", "bob", "1")).await.unwrap();
        store.append_message(NewMessage::text("bob", "alice", "2")).await.unwrap();
        store.append_message(NewMessage::text("alice", "carol", "3")).await.unwrap();

        let between: Vec<String> = store
            .messages_between("bob", "alice")
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.content)
            .collect();
        assert_eq!(between, vec!["1", "2"]);

        let involving: Vec<String> = store
            .messages_involving("alice")
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.content)
            .collect();
        assert_eq!(involving, vec!["3", "2", "1"]);
    }

    #[tokio::test]
    async fn test_set_online_status() {
        let store = InMemoryChatStore::new();
        store.upsert_identity("alice", "a@example.com").await.unwrap();

        let seen = Utc::now();
        store.set_online_status("alice", false, seen).await.unwrap();
        store.set_online_status("ghost", true, seen).await.unwrap();

        let users = store.find_identities("alice").await.unwrap();
        assert!(!users[0].is_online);
        assert_eq!(users[0].last_seen, seen);
    }
}
