//! Test utilities for chat flow testing.
//!
//! Provides a hub factory and a joined-client wrapper that collects the
//! events a session receives.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use parley_chat::{ChatHub, ChatStore, ClientEvent, InMemoryChatStore, ServerEvent, Session};
use tokio::sync::mpsc;
use tokio::time::timeout;

/// Default timeout for waiting on an event.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Initialize test logging once per binary.
pub fn init_test() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("debug")
            .with_test_writer()
            .try_init();
    });
}

/// Hub backed by a fresh in-memory store.
pub fn memory_hub() -> (Arc<ChatHub>, Arc<InMemoryChatStore>) {
    let store = Arc::new(InMemoryChatStore::new());
    let hub = Arc::new(ChatHub::new(Arc::clone(&store) as Arc<dyn ChatStore>));
    (hub, store)
}

/// A session plus the receiving end of its outbound queue.
pub struct TestClient {
    pub session: Session,
    pub rx: mpsc::Receiver<ServerEvent>,
}

impl TestClient {
    /// Open a session without joining.
    pub fn open(hub: &Arc<ChatHub>) -> Self {
        let (session, rx) = hub.open_session();
        Self { session, rx }
    }

    /// Open a session, join as `identity` and consume the `onlineUsers` reply.
    pub async fn join(hub: &Arc<ChatHub>, identity: &str) -> Self {
        let mut client = Self::open(hub);
        client.send(ClientEvent::Join(identity.to_string())).await;
        match client.next().await {
            ServerEvent::OnlineUsers(_) => client,
            other => panic!("expected onlineUsers, got {other:?}"),
        }
    }

    pub async fn send(&mut self, event: ClientEvent) {
        self.session.handle(event).await;
    }

    pub async fn send_message(&mut self, sender: &str, recipient: &str, content: &str) {
        self.send(ClientEvent::SendMessage {
            sender: sender.to_string(),
            recipient: recipient.to_string(),
            content: content.to_string(),
            message_type: Default::default(),
        })
        .await;
    }

    /// Wait for the next event.
    pub async fn next(&mut self) -> ServerEvent {
        timeout(DEFAULT_TIMEOUT, self.rx.recv())
            .await
            .expect("timed out waiting for event")
            .expect("session queue closed")
    }

    /// Every event queued so far, without waiting.
    pub fn drain(&mut self) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }
}
