//! Message delivery pipeline.
//!
//! Every message is persisted before any event about it is emitted. Once the
//! store has accepted it, the recipient gets `newMessage` if it is online and
//! the sender always gets `messageDelivered`. "Delivered" therefore means
//! durably stored, not received.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::error::ChatError;
use crate::event::ServerEvent;
use crate::registry::{ConnectionRegistry, SendResult, SessionHandle};
use crate::store::ChatStore;
use crate::types::{Message, NewMessage};

/// Text of the `error` event sent back when a message cannot be sent.
pub const SEND_FAILED: &str = "Failed to send message";

/// Persists messages and routes them to both participants.
pub struct MessageDeliveryPipeline {
    registry: Arc<ConnectionRegistry>,
    store: Arc<dyn ChatStore>,
}

impl MessageDeliveryPipeline {
    pub fn new(registry: Arc<ConnectionRegistry>, store: Arc<dyn ChatStore>) -> Self {
        Self { registry, store }
    }

    /// Send a message, answering on the sender's registered session.
    pub async fn send_message(&self, message: NewMessage) -> Result<Message, ChatError> {
        self.deliver(message, None).await
    }

    /// Send a message on behalf of the session behind `origin`.
    ///
    /// Confirmations and errors go to `origin` rather than to whatever session
    /// is registered for the sender.
    pub async fn send_message_from(
        &self,
        origin: &SessionHandle,
        message: NewMessage,
    ) -> Result<Message, ChatError> {
        self.deliver(message, Some(origin)).await
    }

    #[instrument(
        skip(self, message, origin),
        fields(sender = %message.sender, recipient = %message.recipient, kind = %message.message_type)
    )]
    async fn deliver(
        &self,
        message: NewMessage,
        origin: Option<&SessionHandle>,
    ) -> Result<Message, ChatError> {
        let sender = message.sender.clone();

        if let Err(e) = message.validate() {
            debug!(error = %e, "Rejected message");
            self.reply(origin, &sender, ServerEvent::error(SEND_FAILED));
            return Err(e);
        }

        let stored = match self.store.append_message(message).await {
            Ok(stored) => stored,
            Err(e) => {
                warn!(error = %e, "Failed to persist message");
                self.reply(origin, &sender, ServerEvent::error(SEND_FAILED));
                return Err(e.into());
            }
        };

        match self
            .registry
            .send_to(&stored.recipient, ServerEvent::NewMessage(stored.clone()))
        {
            SendResult::Sent => debug!(id = %stored.id, "Routed to recipient"),
            SendResult::NotConnected => debug!(id = %stored.id, "Recipient offline, stored only"),
            other => warn!(id = %stored.id, result = ?other, "Recipient did not get message"),
        }

        self.reply(origin, &sender, ServerEvent::MessageDelivered(stored.clone()));
        info!(id = %stored.id, "Message delivered");
        Ok(stored)
    }

    fn reply(&self, origin: Option<&SessionHandle>, sender: &str, event: ServerEvent) -> SendResult {
        match origin {
            Some(handle) => self.registry.send_to_session(handle, event),
            None => self.registry.send_to(sender, event),
        }
    }
}
