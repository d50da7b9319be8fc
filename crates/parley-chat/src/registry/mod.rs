//! Connection Registry for real-time event routing.
//!
//! This module provides a thread-safe registry that tracks the live session of
//! every joined identity, enabling events to be routed to any online user.
//!
//! ## Architecture
//!
//! Each session owns a bounded outbound queue. Joining registers the sending
//! half of that queue under the session's identity; events can then be routed
//! to the identity without touching the session itself.
//!
//! ```text
//! Session (alice) <-> ConnectionRegistry <-> Session (bob)
//!        |                    |                    |
//!        v                    v                    v
//!  mpsc::Receiver       DashMap<String,      mpsc::Receiver
//!                        LiveSession>
//! ```

mod connection_registry;

pub use connection_registry::{ConnectionRegistry, LiveSession, SendResult, SessionHandle};
