//! Conversation summaries.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, instrument};

use crate::error::ChatError;
use crate::store::ChatStore;
use crate::types::ConversationSummary;

/// Derives one summary per conversation partner from message history.
pub struct ConversationSummarizer {
    store: Arc<dyn ChatStore>,
}

impl ConversationSummarizer {
    pub fn new(store: Arc<dyn ChatStore>) -> Self {
        Self { store }
    }

    /// Latest message exchanged with each partner of `identity`.
    ///
    /// The order of the returned list is unspecified. Unread counts are
    /// always zero.
    #[instrument(skip(self))]
    pub async fn summarize(&self, identity: &str) -> Result<Vec<ConversationSummary>, ChatError> {
        let messages = self.store.messages_involving(identity).await?;

        let mut latest: HashMap<String, ConversationSummary> = HashMap::new();
        for message in messages {
            let partner = if message.sender == identity {
                message.recipient
            } else {
                message.sender
            };

            // Keep the first message seen on a timestamp tie
            let newer = latest
                .get(&partner)
                .map_or(true, |current| message.timestamp > current.timestamp);
            if newer {
                latest.insert(
                    partner.clone(),
                    ConversationSummary {
                        partner,
                        last_message: message.content,
                        timestamp: message.timestamp,
                        unread_count: 0,
                    },
                );
            }
        }

        debug!(conversations = latest.len(), "Summarized conversations");
        Ok(latest.into_values().collect())
    }
}
