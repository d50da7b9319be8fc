//! Typing indicator relay.

use std::sync::Arc;

use tracing::{instrument, trace};

use crate::event::ServerEvent;
use crate::registry::{ConnectionRegistry, SendResult};

/// Forwards typing signals to the recipient when it is online.
///
/// Holds no state: no deduplication, no expiry. A stale "typing" indicator is
/// the client's problem.
pub struct TypingIndicatorTracker {
    registry: Arc<ConnectionRegistry>,
}

impl TypingIndicatorTracker {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    #[instrument(skip(self), level = "trace")]
    pub fn set_typing(&self, sender: &str, recipient: &str, is_typing: bool) -> SendResult {
        let result = self.registry.send_to(
            recipient,
            ServerEvent::UserTyping {
                username: sender.to_string(),
                is_typing,
            },
        );
        if !result.is_sent() {
            trace!(?result, "Typing signal dropped");
        }
        result
    }
}
