//! Relay events - facts already committed by the write path
//!
//! Each event is immutable; the relay only translates it into outbound
//! frames and inbox updates. The partition key (conversation id for
//! message/conversation events, user id for presence events) pins all
//! events for one key to one log partition, which is what preserves
//! per-key ordering across a pool of relay workers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ConversationId, MessageId, UserId};

/// All event kinds the relay understands
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum RelayEvent {
    #[serde(rename = "message.created")]
    MessageCreated(MessageCreatedEvent),

    #[serde(rename = "message.read")]
    MessageRead(MessageReadEvent),

    #[serde(rename = "conversation.updated")]
    ConversationUpdated(ConversationUpdatedEvent),

    #[serde(rename = "presence.changed")]
    PresenceChanged(PresenceChangedEvent),
}

impl RelayEvent {
    /// Wire name of the event kind
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MessageCreated(_) => "message.created",
            Self::MessageRead(_) => "message.read",
            Self::ConversationUpdated(_) => "conversation.updated",
            Self::PresenceChanged(_) => "presence.changed",
        }
    }

    /// Partition/ordering key: conversation id for message and
    /// conversation events, user id for presence events
    #[must_use]
    pub fn partition_key(&self) -> String {
        match self {
            Self::MessageCreated(e) => e.conversation_id.to_string(),
            Self::MessageRead(e) => e.conversation_id.to_string(),
            Self::ConversationUpdated(e) => e.conversation_id.to_string(),
            Self::PresenceChanged(e) => e.user_id.to_string(),
        }
    }

    /// When the underlying fact was committed
    #[must_use]
    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            Self::MessageCreated(e) => e.created_at,
            Self::MessageRead(e) => e.read_at,
            Self::ConversationUpdated(e) => e.updated_at,
            Self::PresenceChanged(e) => e.at,
        }
    }

    /// Decode a log entry. Returns `Ok(None)` for a kind this build does
    /// not recognize, so consumers can acknowledge and move on instead of
    /// wedging the partition.
    pub fn decode(kind: &str, payload: &str) -> Result<Option<Self>, serde_json::Error> {
        let event = match kind {
            "message.created" => Some(Self::MessageCreated(serde_json::from_str(payload)?)),
            "message.read" => Some(Self::MessageRead(serde_json::from_str(payload)?)),
            "conversation.updated" => {
                Some(Self::ConversationUpdated(serde_json::from_str(payload)?))
            }
            "presence.changed" => Some(Self::PresenceChanged(serde_json::from_str(payload)?)),
            _ => None,
        };
        Ok(event)
    }

    /// Encode as a (kind, payload) pair for the log
    pub fn encode(&self) -> Result<(&'static str, String), serde_json::Error> {
        let payload = match self {
            Self::MessageCreated(e) => serde_json::to_string(e)?,
            Self::MessageRead(e) => serde_json::to_string(e)?,
            Self::ConversationUpdated(e) => serde_json::to_string(e)?,
            Self::PresenceChanged(e) => serde_json::to_string(e)?,
        };
        Ok((self.kind(), payload))
    }
}

/// A message was durably created. `sequence` is the write path's strictly
/// increasing per-conversation number; `key_ref` is at-rest encryption
/// bookkeeping that must never reach a client frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageCreatedEvent {
    pub message_id: MessageId,
    pub conversation_id: ConversationId,
    pub sender_id: UserId,
    pub sequence: u64,
    pub body: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_ref: Option<String>,
}

/// A user advanced their read position in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageReadEvent {
    pub message_id: MessageId,
    pub conversation_id: ConversationId,
    pub user_id: UserId,
    /// Sequence of the message read up to (inclusive)
    pub read_sequence: u64,
    pub read_at: DateTime<Utc>,
}

/// Conversation metadata changed (rename and the like)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationUpdatedEvent {
    pub conversation_id: ConversationId,
    pub name: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// A user crossed the online/offline boundary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceChangedEvent {
    pub user_id: UserId,
    pub online: bool,
    pub at: DateTime<Utc>,
}

impl MessageCreatedEvent {
    pub fn new(
        message_id: MessageId,
        conversation_id: ConversationId,
        sender_id: UserId,
        sequence: u64,
        body: impl Into<String>,
    ) -> Self {
        Self {
            message_id,
            conversation_id,
            sender_id,
            sequence,
            body: body.into(),
            created_at: Utc::now(),
            key_ref: None,
        }
    }

    #[must_use]
    pub fn with_key_ref(mut self, key_ref: impl Into<String>) -> Self {
        self.key_ref = Some(key_ref.into());
        self
    }
}

impl MessageReadEvent {
    pub fn new(
        message_id: MessageId,
        conversation_id: ConversationId,
        user_id: UserId,
        read_sequence: u64,
    ) -> Self {
        Self {
            message_id,
            conversation_id,
            user_id,
            read_sequence,
            read_at: Utc::now(),
        }
    }
}

impl ConversationUpdatedEvent {
    pub fn new(conversation_id: ConversationId, name: Option<String>) -> Self {
        Self {
            conversation_id,
            name,
            updated_at: Utc::now(),
        }
    }
}

impl PresenceChangedEvent {
    pub fn new(user_id: UserId, online: bool) -> Self {
        Self {
            user_id,
            online,
            at: Utc::now(),
        }
    }
}
