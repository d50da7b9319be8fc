//! Connection Registry implementation.
//!
//! Tracks live sessions by identity for event routing.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::event::ServerEvent;

/// Channel handle for one live session.
///
/// Cloning the handle clones the queue sender; all clones refer to the same
/// session and share its id and supersession token.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: Uuid,
    sender: mpsc::Sender<ServerEvent>,
    superseded: CancellationToken,
}

impl SessionHandle {
    /// Wrap an existing queue sender in a handle with a fresh session id.
    pub fn new(sender: mpsc::Sender<ServerEvent>) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender,
            superseded: CancellationToken::new(),
        }
    }

    /// Create a handle together with the receiving end of its queue.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ServerEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }

    /// Session id.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Mark the session as replaced by a newer join.
    ///
    /// Signalled outside the queue so a transport can close the connection
    /// even when the queue is full.
    pub fn supersede(&self) {
        self.superseded.cancel();
    }

    /// Token cancelled once the session has been superseded.
    pub fn superseded_token(&self) -> CancellationToken {
        self.superseded.clone()
    }

    pub fn is_superseded(&self) -> bool {
        self.superseded.is_cancelled()
    }

    /// Queue an event without waiting.
    ///
    /// A full queue drops the event; the caller only learns about it through
    /// the returned [`SendResult`].
    pub fn send(&self, event: ServerEvent) -> SendResult {
        match self.sender.try_send(event) {
            Ok(()) => SendResult::Sent,
            Err(mpsc::error::TrySendError::Full(event)) => {
                warn!(
                    session = %self.id,
                    event = event.name(),
                    "Outbound queue full, dropping event"
                );
                SendResult::ChannelFull
            }
            Err(mpsc::error::TrySendError::Closed(event)) => {
                debug!(
                    session = %self.id,
                    event = event.name(),
                    "Outbound queue closed, session may have dropped"
                );
                SendResult::ChannelClosed
            }
        }
    }
}

/// Registry entry for a joined identity.
#[derive(Debug, Clone)]
pub struct LiveSession {
    /// Channel to the session
    pub handle: SessionHandle,
    /// When this session joined
    pub joined_at: DateTime<Utc>,
}

/// Result of attempting to send an event to a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendResult {
    /// Event was queued for delivery
    Sent,
    /// The identity is not currently connected
    NotConnected,
    /// The session's queue is full (event dropped)
    ChannelFull,
    /// The session's queue is closed (event dropped)
    ChannelClosed,
}

impl SendResult {
    /// Whether the event was queued.
    pub fn is_sent(&self) -> bool {
        matches!(self, SendResult::Sent)
    }
}

/// Registry of live sessions.
///
/// Thread-safe registry that maps identities to their live session. Uses
/// DashMap for concurrent access without explicit locking; no shard guard is
/// ever held across an `.await`.
///
/// At most one session is registered per identity. Registering again replaces
/// the previous entry and hands the old handle back to the caller.
///
/// ## Usage
///
/// ```ignore
/// let registry = ConnectionRegistry::new();
///
/// // When a session joins:
/// let (handle, rx) = SessionHandle::channel(256);
/// let previous = registry.register("alice", handle);
///
/// // When routing an event:
/// let result = registry.send_to("alice", ServerEvent::UserOnline("bob".into()));
///
/// // When the session closes:
/// registry.remove("alice");
/// ```
pub struct ConnectionRegistry {
    sessions: DashMap<String, LiveSession>,
}

impl ConnectionRegistry {
    /// Create a new connection registry.
    pub fn new() -> Self {
        info!("Creating connection registry");
        Self {
            sessions: DashMap::new(),
        }
    }

    /// Register a session for an identity.
    ///
    /// If the identity already has a session it is replaced, and the previous
    /// handle is returned so the caller can notify it.
    #[instrument(skip(self, handle), fields(identity = %identity, session = %handle.id()))]
    pub fn register(&self, identity: &str, handle: SessionHandle) -> Option<SessionHandle> {
        let entry = LiveSession {
            handle,
            joined_at: Utc::now(),
        };
        let existing = self.sessions.insert(identity.to_string(), entry);
        if existing.is_some() {
            debug!("Replaced existing session registration");
        } else {
            debug!("Registered new session");
        }
        existing.map(|previous| previous.handle)
    }

    /// Get the current session handle for an identity.
    pub fn lookup(&self, identity: &str) -> Option<SessionHandle> {
        self.sessions
            .get(identity)
            .map(|entry| entry.value().handle.clone())
    }

    /// Remove an identity's session.
    ///
    /// Returns the entry if the identity was registered, None otherwise.
    #[instrument(skip(self), fields(identity = %identity))]
    pub fn remove(&self, identity: &str) -> Option<LiveSession> {
        let removed = self.sessions.remove(identity);
        if removed.is_some() {
            debug!("Removed session");
        } else {
            debug!("Identity was not registered");
        }
        removed.map(|(_, entry)| entry)
    }

    /// Remove an identity's session only if it is still `session_id`.
    ///
    /// Returns false when the identity is unregistered or has since been
    /// taken over by another session.
    #[instrument(skip(self), fields(identity = %identity, session = %session_id))]
    pub fn remove_session(&self, identity: &str, session_id: Uuid) -> bool {
        let removed = self
            .sessions
            .remove_if(identity, |_, entry| entry.handle.id() == session_id)
            .is_some();
        if removed {
            debug!("Removed session");
        } else {
            debug!("Session no longer current for identity");
        }
        removed
    }

    /// All identities registered at call time.
    pub fn snapshot(&self) -> BTreeSet<String> {
        self.sessions.iter().map(|r| r.key().clone()).collect()
    }

    /// Check if an identity is currently connected.
    pub fn is_connected(&self, identity: &str) -> bool {
        self.sessions.contains_key(identity)
    }

    /// Get the number of live sessions.
    pub fn connection_count(&self) -> usize {
        self.sessions.len()
    }

    /// Send an event to an identity's current session.
    #[instrument(skip(self, event), fields(to = %identity, event = event.name()))]
    pub fn send_to(&self, identity: &str, event: ServerEvent) -> SendResult {
        // Clone the handle so the shard guard is released before sending.
        let Some(handle) = self.lookup(identity) else {
            debug!("Recipient not connected");
            return SendResult::NotConnected;
        };

        let result = handle.send(event);
        if result.is_sent() {
            debug!("Event queued for delivery");
        }
        result
    }

    /// Send an event to a session through a handle the caller already holds.
    ///
    /// The handle does not need to be registered; a session that has not
    /// joined yet can still be answered this way.
    #[instrument(skip(self, handle, event), fields(session = %handle.id(), event = event.name()))]
    pub fn send_to_session(&self, handle: &SessionHandle, event: ServerEvent) -> SendResult {
        let result = handle.send(event);
        if result.is_sent() {
            debug!("Event queued for delivery");
        }
        result
    }

    /// Send an event to every session except `excluded`'s.
    ///
    /// Returns how many sessions the event was queued for.
    #[instrument(skip(self, event), fields(event = event.name()))]
    pub fn broadcast_except(&self, excluded: &str, event: ServerEvent) -> usize {
        let targets: Vec<SessionHandle> = self
            .sessions
            .iter()
            .filter(|entry| entry.key() != excluded)
            .map(|entry| entry.value().handle.clone())
            .collect();

        let delivered = targets
            .into_iter()
            .filter(|handle| handle.send(event.clone()).is_sent())
            .count();

        debug!(delivered, "Broadcast queued");
        delivered
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("connection_count", &self.sessions.len())
            .finish()
    }
}
