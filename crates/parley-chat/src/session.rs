//! Per-connection session state.
//!
//! A [`Session`] is what a transport holds for one open connection. It owns
//! the sending half of the connection's outbound queue, remembers which
//! identity the connection announced, and turns inbound [`ClientEvent`]s into
//! kernel calls.
//!
//! ```text
//! transport frame ──> ClientEvent ──> Session::handle ──> ChatHub
//!                                                           │
//! transport frame <── ServerEvent <── mpsc::Receiver <──────┘
//! ```

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::event::{ClientEvent, ServerEvent};
use crate::hub::ChatHub;
use crate::registry::SessionHandle;
use crate::types::NewMessage;

/// One live connection.
pub struct Session {
    hub: Arc<ChatHub>,
    handle: SessionHandle,
    identity: Option<String>,
}

impl Session {
    /// Open a session on `hub` with a fresh outbound queue.
    pub fn open(hub: Arc<ChatHub>) -> (Self, mpsc::Receiver<ServerEvent>) {
        let (handle, rx) = SessionHandle::channel(hub.queue_capacity());
        debug!(session = %handle.id(), "Session opened");
        (
            Self {
                hub,
                handle,
                identity: None,
            },
            rx,
        )
    }

    pub fn id(&self) -> Uuid {
        self.handle.id()
    }

    pub fn session_handle(&self) -> &SessionHandle {
        &self.handle
    }

    /// Identity announced by the last `join`, if any.
    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    /// Dispatch one inbound event.
    #[instrument(skip(self, event), fields(session = %self.handle.id(), event = event_name(&event)))]
    pub async fn handle(&mut self, event: ClientEvent) {
        match event {
            ClientEvent::Join(identity) => self.join(identity).await,
            ClientEvent::SendMessage {
                sender,
                recipient,
                content,
                message_type,
            } => {
                let message = NewMessage {
                    sender,
                    recipient,
                    content,
                    message_type,
                };
                // Failures are reported to this session as `error` events
                let _ = self
                    .hub
                    .pipeline()
                    .send_message_from(&self.handle, message)
                    .await;
            }
            ClientEvent::Typing {
                recipient,
                is_typing,
            } => match &self.identity {
                Some(sender) => {
                    self.hub.typing().set_typing(sender, &recipient, is_typing);
                }
                None => debug!("Typing before join, dropped"),
            },
        }
    }

    async fn join(&mut self, identity: String) {
        if identity.is_empty() {
            debug!("Join without identity, dropped");
            return;
        }

        if let Some(previous) = self.identity.take() {
            if previous != identity {
                info!(from = %previous, to = %identity, "Session switching identity");
                self.hub.presence().on_disconnect(&previous, self.id()).await;
            }
        }

        self.hub
            .presence()
            .on_join(&identity, self.handle.clone())
            .await;
        self.identity = Some(identity);
    }

    /// Leave on connection close.
    ///
    /// Nothing is announced if this session never joined or has been
    /// superseded by a newer one.
    pub async fn close(self) {
        if let Some(identity) = &self.identity {
            self.hub.presence().on_disconnect(identity, self.id()).await;
        }
        debug!(session = %self.id(), "Session closed");
    }
}

fn event_name(event: &ClientEvent) -> &'static str {
    match event {
        ClientEvent::Join(_) => "join",
        ClientEvent::SendMessage { .. } => "sendMessage",
        ClientEvent::Typing { .. } => "typing",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ChatStore, InMemoryChatStore};
    use crate::types::MessageType;

    fn hub() -> Arc<ChatHub> {
        Arc::new(ChatHub::new(Arc::new(InMemoryChatStore::new())))
    }

    fn send(sender: &str, recipient: &str, content: &str) -> ClientEvent {
        ClientEvent::SendMessage {
            sender: sender.to_string(),
            recipient: recipient.to_string(),
            content: content.to_string(),
            message_type: MessageType::Text,
        }
    }

    #[tokio::test]
    async fn test_join_sets_identity() {
        let hub = hub();
        let (mut session, mut rx) = hub.open_session();
        assert!(session.identity().is_none());

        session.handle(ClientEvent::Join("alice".to_string())).await;

        assert_eq!(session.identity(), Some("alice"));
        assert_eq!(
            rx.recv().await,
            Some(ServerEvent::OnlineUsers(vec!["alice".to_string()]))
        );
    }

    #[tokio::test]
    async fn test_send_before_join_still_answers() {
        let hub = hub();
        let (mut session, mut rx) = hub.open_session();

        session.handle(send("alice", "bob", "hi")).await;
        assert_eq!(rx.recv().await.map(|e| e.name()), Some("messageDelivered"));

        session.handle(send("alice", "bob", "")).await;
        assert_eq!(
            rx.recv().await,
            Some(ServerEvent::error("Failed to send message"))
        );
    }

    #[tokio::test]
    async fn test_typing_before_join_dropped() {
        let hub = hub();
        let (mut bob, mut bob_rx) = hub.open_session();
        bob.handle(ClientEvent::Join("bob".to_string())).await;
        bob_rx.recv().await;

        let (mut anon, _anon_rx) = hub.open_session();
        anon.handle(ClientEvent::Typing {
            recipient: "bob".to_string(),
            is_typing: true,
        })
        .await;

        assert!(bob_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_empty_join_dropped() {
        let hub = hub();
        let (mut bob, mut bob_rx) = hub.open_session();
        bob.handle(ClientEvent::Join("bob".to_string())).await;
        bob_rx.recv().await;

        let (mut anon, mut anon_rx) = hub.open_session();
        anon.handle(ClientEvent::Join(String::new())).await;

        assert!(anon.identity().is_none());
        assert!(anon_rx.try_recv().is_err());
        assert!(bob_rx.try_recv().is_err());
        assert_eq!(hub.online_count(), 1);
    }

    #[tokio::test]
    async fn test_switching_identity_leaves_previous() {
        let hub = hub();
        let (mut watcher, mut watcher_rx) = hub.open_session();
        watcher.handle(ClientEvent::Join("carol".to_string())).await;
        watcher_rx.recv().await;

        let (mut session, _rx) = hub.open_session();
        session.handle(ClientEvent::Join("alice".to_string())).await;
        session.handle(ClientEvent::Join("alice2".to_string())).await;

        assert_eq!(
            watcher_rx.recv().await,
            Some(ServerEvent::UserOnline("alice".to_string()))
        );
        assert_eq!(
            watcher_rx.recv().await,
            Some(ServerEvent::UserOffline("alice".to_string()))
        );
        assert_eq!(
            watcher_rx.recv().await,
            Some(ServerEvent::UserOnline("alice2".to_string()))
        );
        assert!(!hub.registry().is_connected("alice"));
    }

    #[tokio::test]
    async fn test_close_marks_user_offline() {
        let store = Arc::new(InMemoryChatStore::new());
        store.upsert_identity("alice", "a@example.com").await.unwrap();
        let hub = Arc::new(ChatHub::new(store.clone()));

        let (mut session, _rx) = hub.open_session();
        session.handle(ClientEvent::Join("alice".to_string())).await;
        session.close().await;

        assert_eq!(hub.online_count(), 0);
        assert!(!store.find_identities("alice").await.unwrap()[0].is_online);
    }

    #[tokio::test]
    async fn test_close_without_join_is_silent() {
        let hub = hub();
        let (mut bob, mut bob_rx) = hub.open_session();
        bob.handle(ClientEvent::Join("bob".to_string())).await;
        bob_rx.recv().await;

        let (anon, _rx) = hub.open_session();
        anon.close().await;

        assert!(bob_rx.try_recv().is_err());
        assert_eq!(hub.online_count(), 1);
    }
}
