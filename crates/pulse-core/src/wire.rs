//! Client wire catalog
//!
//! Everything that crosses a WebSocket, in both directions. Frames are
//! also what the broadcast fabric carries between instances, so the
//! shapes here are the public contract: nothing internal (log sequences,
//! encryption bookkeeping) appears in them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ConversationId, MessageId, UserId};

/// Outbound frame (core -> client)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Frame {
    #[serde(rename = "message.new", rename_all = "camelCase")]
    MessageNew {
        id: MessageId,
        conversation_id: ConversationId,
        sender_id: UserId,
        body: String,
        created_at: DateTime<Utc>,
    },

    #[serde(rename = "typing", rename_all = "camelCase")]
    Typing {
        conversation_id: ConversationId,
        user_id: UserId,
        is_typing: bool,
    },

    #[serde(rename = "read.receipt", rename_all = "camelCase")]
    ReadReceipt {
        message_id: MessageId,
        conversation_id: ConversationId,
        user_id: UserId,
        read_at: DateTime<Utc>,
    },

    #[serde(rename = "presence", rename_all = "camelCase")]
    Presence { user_id: UserId, online: bool },

    #[serde(rename = "conversation.updated", rename_all = "camelCase")]
    ConversationUpdated {
        conversation_id: ConversationId,
        name: Option<String>,
        updated_at: DateTime<Utc>,
    },

    #[serde(rename = "heartbeat.ack")]
    HeartbeatAck,

    #[serde(rename = "error", rename_all = "camelCase")]
    Error { code: String, message: String },
}

impl Frame {
    /// Wire name of the frame type
    #[must_use]
    pub fn frame_type(&self) -> &'static str {
        match self {
            Self::MessageNew { .. } => "message.new",
            Self::Typing { .. } => "typing",
            Self::ReadReceipt { .. } => "read.receipt",
            Self::Presence { .. } => "presence",
            Self::ConversationUpdated { .. } => "conversation.updated",
            Self::HeartbeatAck => "heartbeat.ack",
            Self::Error { .. } => "error",
        }
    }

    /// Build an error frame with a stable machine code
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Inbound command (client -> core)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientCommand {
    #[serde(rename = "join", rename_all = "camelCase")]
    Join { conversation_id: ConversationId },

    #[serde(rename = "leave", rename_all = "camelCase")]
    Leave { conversation_id: ConversationId },

    #[serde(rename = "typing", rename_all = "camelCase")]
    Typing {
        conversation_id: ConversationId,
        is_typing: bool,
    },

    #[serde(rename = "heartbeat")]
    Heartbeat,
}
