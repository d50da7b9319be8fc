//! Core chat types shared by the kernel, the stores and the transports.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ChatError;

/// Kind of content carried by a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    /// Plain text (default)
    #[default]
    Text,
    /// Image reference
    Image,
    /// File reference
    File,
}

impl MessageType {
    /// Wire/storage name of this message type.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Text => "text",
            MessageType::Image => "image",
            MessageType::File => "file",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(MessageType::Text),
            "image" => Ok(MessageType::Image),
            "file" => Ok(MessageType::File),
            other => Err(format!("unknown message type: {other}")),
        }
    }
}

/// A persisted chat message.
///
/// Created by the delivery pipeline through the store, which assigns `id`
/// and `timestamp`. Immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Store-assigned identifier (UUID v7)
    pub id: String,
    /// Sending identity
    pub sender: String,
    /// Receiving identity
    pub recipient: String,
    /// Message body
    pub content: String,
    /// Content kind
    pub message_type: MessageType,
    /// Store-assigned timestamp
    pub timestamp: DateTime<Utc>,
    /// Persisted read flag. Never consulted by the kernel.
    pub is_read: bool,
}

/// A message that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub sender: String,
    pub recipient: String,
    pub content: String,
    pub message_type: MessageType,
}

impl NewMessage {
    /// Create a new text message.
    pub fn text(
        sender: impl Into<String>,
        recipient: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            sender: sender.into(),
            recipient: recipient.into(),
            content: content.into(),
            message_type: MessageType::Text,
        }
    }

    /// Set the message type.
    pub fn with_type(mut self, message_type: MessageType) -> Self {
        self.message_type = message_type;
        self
    }

    /// Check that every required field is present.
    pub fn validate(&self) -> Result<(), ChatError> {
        if self.sender.is_empty() {
            return Err(ChatError::validation("sender is required"));
        }
        if self.recipient.is_empty() {
            return Err(ChatError::validation("recipient is required"));
        }
        if self.content.is_empty() {
            return Err(ChatError::validation("content is required"));
        }
        Ok(())
    }
}

/// A known user as held by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: String,
    pub username: String,
    pub email: String,
    pub is_online: bool,
    pub last_seen: DateTime<Utc>,
}

/// Latest exchange with one conversation partner.
///
/// Derived on demand from message history; never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    /// The other participant
    pub partner: String,
    /// Content of the most recent message
    pub last_message: String,
    /// Timestamp of the most recent message
    pub timestamp: DateTime<Utc>,
    /// Always zero: read tracking is not implemented.
    pub unread_count: u32,
}
