//! Events exchanged between a live session and the kernel.
//!
//! Both directions use the same JSON envelope:
//!
//! ```text
//! {"event": "sendMessage", "data": {"sender": "alice", "recipient": "bob", "content": "hi"}}
//! {"event": "userOnline",  "data": "bob"}
//! ```

use serde::{Deserialize, Serialize};

use crate::types::{Message, MessageType};

/// Event sent by a client session.
///
/// Closing the transport is the implicit `disconnect` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ClientEvent {
    /// Announce the identity bound to this session
    Join(String),
    /// Send a chat message
    SendMessage {
        // Missing fields deserialize as empty and fail validation, so the
        // client still gets an `error` event back.
        #[serde(default)]
        sender: String,
        #[serde(default)]
        recipient: String,
        #[serde(default)]
        content: String,
        #[serde(default)]
        message_type: MessageType,
    },
    /// Start or stop a typing indicator towards `recipient`
    Typing { recipient: String, is_typing: bool },
}

/// Event delivered to a live session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ServerEvent {
    /// Identities online right after this session joined
    OnlineUsers(Vec<String>),
    /// Another identity joined
    UserOnline(String),
    /// Another identity left
    UserOffline(String),
    /// A message addressed to this session's identity
    NewMessage(Message),
    /// A message sent by this session's identity was persisted
    MessageDelivered(Message),
    /// Typing indicator from a conversation partner
    UserTyping { username: String, is_typing: bool },
    /// A request from this session failed
    Error { message: String },
    /// A newer session joined with the same identity and replaced this one
    SessionSuperseded { username: String },
}

impl ServerEvent {
    /// Event name as it appears on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::OnlineUsers(_) => "onlineUsers",
            ServerEvent::UserOnline(_) => "userOnline",
            ServerEvent::UserOffline(_) => "userOffline",
            ServerEvent::NewMessage(_) => "newMessage",
            ServerEvent::MessageDelivered(_) => "messageDelivered",
            ServerEvent::UserTyping { .. } => "userTyping",
            ServerEvent::Error { .. } => "error",
            ServerEvent::SessionSuperseded { .. } => "sessionSuperseded",
        }
    }

    /// Create an error event.
    pub fn error(message: impl Into<String>) -> Self {
        ServerEvent::Error {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_join() {
        let event: ClientEvent =
            serde_json::from_value(json!({"event": "join", "data": "alice"})).unwrap();
        assert_eq!(event, ClientEvent::Join("alice".to_string()));
    }

    #[test]
    fn test_parse_send_message_defaults_to_text() {
        let event: ClientEvent = serde_json::from_value(json!({
            "event": "sendMessage",
            "data": {"sender": "alice", "recipient": "bob", "content": "hi"}
        }))
        .unwrap();

        assert_eq!(
            event,
            ClientEvent::SendMessage {
                sender: "alice".to_string(),
                recipient: "bob".to_string(),
                content: "hi".to_string(),
                message_type: MessageType::Text,
            }
        );
    }

    #[test]
    fn test_parse_send_message_missing_content_is_empty() {
        let event: ClientEvent = serde_json::from_value(json!({
            "event": "sendMessage",
            "data": {"sender": "alice", "recipient": "bob", "messageType": "file"}
        }))
        .unwrap();

        match event {
            ClientEvent::SendMessage {
                content,
                message_type,
                ..
            } => {
                assert!(content.is_empty());
                assert_eq!(message_type, MessageType::File);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_parse_typing() {
        let event: ClientEvent = serde_json::from_value(json!({
            "event": "typing",
            "data": {"recipient": "bob", "isTyping": true}
        }))
        .unwrap();
        assert_eq!(
            event,
            ClientEvent::Typing {
                recipient: "bob".to_string(),
                is_typing: true
            }
        );
    }

    #[test]
    fn test_unknown_event_rejected() {
        let result: Result<ClientEvent, _> =
            serde_json::from_value(json!({"event": "shout", "data": "hey"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_server_event_wire_format() {
        let online = serde_json::to_value(ServerEvent::OnlineUsers(vec!["alice".into()])).unwrap();
        assert_eq!(online, json!({"event": "onlineUsers", "data": ["alice"]}));

        let typing = serde_json::to_value(ServerEvent::UserTyping {
            username: "alice".into(),
            is_typing: false,
        })
        .unwrap();
        assert_eq!(
            typing,
            json!({"event": "userTyping", "data": {"username": "alice", "isTyping": false}})
        );

        let error = serde_json::to_value(ServerEvent::error("Failed to send message")).unwrap();
        assert_eq!(
            error,
            json!({"event": "error", "data": {"message": "Failed to send message"}})
        );
    }

    #[test]
    fn test_name_matches_serialized_tag() {
        let events = [
            ServerEvent::UserOnline("a".into()),
            ServerEvent::UserOffline("a".into()),
            ServerEvent::error("x"),
            ServerEvent::SessionSuperseded {
                username: "a".into(),
            },
        ];
        for event in events {
            let json = serde_json::to_value(&event).unwrap();
            assert_eq!(json["event"], event.name());
        }
    }
}
