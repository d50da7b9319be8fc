//! Presence broadcast.
//!
//! Announces join/leave transitions to every other live session. Delivery is
//! best effort: sessions that are not connected at broadcast time never see
//! the event and nothing is replayed on reconnect.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::event::ServerEvent;
use crate::registry::{ConnectionRegistry, SessionHandle};
use crate::store::ChatStore;

/// Registers sessions and broadcasts presence changes.
pub struct PresenceBroadcaster {
    registry: Arc<ConnectionRegistry>,
    store: Arc<dyn ChatStore>,
}

impl PresenceBroadcaster {
    pub fn new(registry: Arc<ConnectionRegistry>, store: Arc<dyn ChatStore>) -> Self {
        Self { registry, store }
    }

    /// Register `handle` as the live session of `identity` and announce it.
    ///
    /// The joining session receives `onlineUsers` with the registry snapshot
    /// taken right after registration; every other session receives
    /// `userOnline`. A session replaced by this join is marked superseded,
    /// receives `sessionSuperseded` and is returned.
    #[instrument(skip(self, handle), fields(identity = %identity, session = %handle.id()))]
    pub async fn on_join(&self, identity: &str, handle: SessionHandle) -> Option<SessionHandle> {
        let previous = self.registry.register(identity, handle.clone());

        let superseded = previous.filter(|prev| prev.id() != handle.id());
        if let Some(prev) = &superseded {
            info!(previous = %prev.id(), "Session superseded by a newer join");
            prev.supersede();
            let result = prev.send(ServerEvent::SessionSuperseded {
                username: identity.to_string(),
            });
            if !result.is_sent() {
                warn!(previous = %prev.id(), ?result, "Superseded session was not notified");
            }
        }

        let online: Vec<String> = self.registry.snapshot().into_iter().collect();
        handle.send(ServerEvent::OnlineUsers(online));

        let notified = self
            .registry
            .broadcast_except(identity, ServerEvent::UserOnline(identity.to_string()));
        debug!(notified, "Announced join");

        self.sync_status(identity).await;
        superseded
    }

    /// Remove `identity` and announce that it went offline.
    #[instrument(skip(self), fields(identity = %identity))]
    pub async fn on_leave(&self, identity: &str) {
        self.registry.remove(identity);
        self.announce_leave(identity).await;
    }

    /// Leave on behalf of a closing session.
    ///
    /// Does nothing if the identity now belongs to a newer session. Returns
    /// whether the leave was announced.
    #[instrument(skip(self), fields(identity = %identity, session = %session_id))]
    pub async fn on_disconnect(&self, identity: &str, session_id: Uuid) -> bool {
        if !self.registry.remove_session(identity, session_id) {
            debug!("Closing session was not current, no presence change");
            return false;
        }
        self.announce_leave(identity).await;
        true
    }

    async fn announce_leave(&self, identity: &str) {
        let notified = self
            .registry
            .broadcast_except(identity, ServerEvent::UserOffline(identity.to_string()));
        debug!(notified, "Announced leave");

        self.sync_status(identity).await;
    }

    /// Write the identity's current registry state to the store.
    ///
    /// The state is read just before the write, so a leave racing a rejoin
    /// does not write `false` for an identity that is connected again. Two
    /// writes can still land out of order when both reads happen before
    /// either write; the next join or leave of that identity corrects it.
    async fn sync_status(&self, identity: &str) {
        let online = self.registry.is_connected(identity);
        if let Err(e) = self
            .store
            .set_online_status(identity, online, Utc::now())
            .await
        {
            warn!(identity = %identity, online, error = %e, "Failed to record online status");
        }
    }
}
