//! # parley-chat
//!
//! Real-time session and delivery kernel for Parley one-to-one chat.
//!
//! This crate tracks which identities hold a live connection, broadcasts
//! presence transitions, routes chat messages with a delivery confirmation,
//! relays typing indicators and summarizes conversations. It knows nothing
//! about the transport: every live session is a bounded event queue that the
//! transport drains.
//!
//! ## Architecture
//!
//! ```text
//!  Session (alice) ──┐                                   ┌──> mpsc queue (alice) ──> transport
//!                    ├──> ChatHub ──> ConnectionRegistry ┤
//!  Session (bob)   ──┘       │                           └──> mpsc queue (bob)   ──> transport
//!                            v
//!                        ChatStore (in-memory / libSQL)
//! ```
//!
//! - **ConnectionRegistry**: identity -> live session handle
//! - **PresenceBroadcaster**: join/leave announcements
//! - **MessageDeliveryPipeline**: persist, route, confirm
//! - **TypingIndicatorTracker**: stateless typing relay
//! - **ConversationSummarizer**: latest message per conversation partner

pub mod delivery;
pub mod event;
pub mod hub;
pub mod presence;
pub mod registry;
pub mod session;
pub mod store;
pub mod summary;
pub mod typing;

mod error;
mod types;

pub use delivery::MessageDeliveryPipeline;
pub use error::ChatError;
pub use event::{ClientEvent, ServerEvent};
pub use hub::{ChatHub, DEFAULT_QUEUE_CAPACITY};
pub use presence::PresenceBroadcaster;
pub use registry::{ConnectionRegistry, LiveSession, SendResult, SessionHandle};
pub use session::Session;
pub use store::{ChatStore, InMemoryChatStore, LibSqlChatStore, StoreError};
pub use summary::ConversationSummarizer;
pub use typing::TypingIndicatorTracker;
pub use types::*;
