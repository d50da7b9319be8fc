//! Chat hub wiring the kernel components together.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::info;

use crate::delivery::MessageDeliveryPipeline;
use crate::event::ServerEvent;
use crate::presence::PresenceBroadcaster;
use crate::registry::ConnectionRegistry;
use crate::session::Session;
use crate::store::ChatStore;
use crate::summary::ConversationSummarizer;
use crate::typing::TypingIndicatorTracker;

/// Default capacity of a session's outbound queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Shared entry point for transports.
///
/// One hub per process; every component shares the same registry and store.
pub struct ChatHub {
    registry: Arc<ConnectionRegistry>,
    store: Arc<dyn ChatStore>,
    presence: PresenceBroadcaster,
    pipeline: MessageDeliveryPipeline,
    typing: TypingIndicatorTracker,
    summarizer: ConversationSummarizer,
    queue_capacity: usize,
}

impl ChatHub {
    pub fn new(store: Arc<dyn ChatStore>) -> Self {
        Self::with_queue_capacity(store, DEFAULT_QUEUE_CAPACITY)
    }

    /// Create a hub whose sessions get outbound queues of `capacity` events.
    ///
    /// A capacity of zero is raised to one.
    pub fn with_queue_capacity(store: Arc<dyn ChatStore>, capacity: usize) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let queue_capacity = capacity.max(1);
        info!(queue_capacity, "Creating chat hub");

        Self {
            presence: PresenceBroadcaster::new(Arc::clone(&registry), Arc::clone(&store)),
            pipeline: MessageDeliveryPipeline::new(Arc::clone(&registry), Arc::clone(&store)),
            typing: TypingIndicatorTracker::new(Arc::clone(&registry)),
            summarizer: ConversationSummarizer::new(Arc::clone(&store)),
            registry,
            store,
            queue_capacity,
        }
    }

    /// Open a new session with its own outbound queue.
    ///
    /// The transport drains the returned receiver and must call
    /// [`Session::close`] when the connection ends.
    pub fn open_session(self: &Arc<Self>) -> (Session, mpsc::Receiver<ServerEvent>) {
        Session::open(Arc::clone(self))
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn store(&self) -> &Arc<dyn ChatStore> {
        &self.store
    }

    pub fn presence(&self) -> &PresenceBroadcaster {
        &self.presence
    }

    pub fn pipeline(&self) -> &MessageDeliveryPipeline {
        &self.pipeline
    }

    pub fn typing(&self) -> &TypingIndicatorTracker {
        &self.typing
    }

    pub fn summarizer(&self) -> &ConversationSummarizer {
        &self.summarizer
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    /// Number of joined identities.
    pub fn online_count(&self) -> usize {
        self.registry.connection_count()
    }
}
