//! Collaborator contracts (ports)
//!
//! The delivery core defines what it needs from the write path's world;
//! infrastructure crates provide the implementations. Keeping these
//! narrow is what lets the whole reconciliation pipeline run against
//! in-memory fakes in tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::ids::{ConversationId, UserId};

/// Result type for contract operations
pub type ContractResult<T> = Result<T, CoreError>;

/// Conversation-participant membership, the authorization source for
/// room joins and the recipient set for inbox fan-out
#[async_trait]
pub trait Membership: Send + Sync {
    /// Whether `user_id` is a participant of `conversation_id`
    async fn is_participant(
        &self,
        conversation_id: ConversationId,
        user_id: UserId,
    ) -> ContractResult<bool>;

    /// All participants of `conversation_id`
    async fn participants(&self, conversation_id: ConversationId) -> ContractResult<Vec<UserId>>;
}

/// Read model over the write path's committed message log, used to
/// recompute unread counts instead of trusting a running counter
#[async_trait]
pub trait ConversationReader: Send + Sync {
    /// Messages in the conversation with sequence greater than
    /// `after_sequence`, not authored by `excluding`
    async fn count_since(
        &self,
        conversation_id: ConversationId,
        after_sequence: u64,
        excluding: UserId,
    ) -> ContractResult<u64>;

    /// Highest committed sequence for the conversation (0 when empty)
    async fn latest_sequence(&self, conversation_id: ConversationId) -> ContractResult<u64>;
}

/// Per (user, conversation) unread bookkeeping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboxCounter {
    pub user_id: UserId,
    pub conversation_id: ConversationId,
    /// Messages from others the user has not read yet; never negative
    pub unread: u64,
    /// Highest message sequence this counter has absorbed
    pub last_applied_seq: u64,
    /// Highest sequence the user has confirmed reading
    pub last_read_seq: u64,
}

impl InboxCounter {
    /// Fresh counter for a pair that has no recorded state yet
    #[must_use]
    pub fn new(user_id: UserId, conversation_id: ConversationId) -> Self {
        Self {
            user_id,
            conversation_id,
            unread: 0,
            last_applied_seq: 0,
            last_read_seq: 0,
        }
    }
}

/// Persistence for inbox counters. Implementations only need per-key
/// atomicity; cross-key consistency comes from the relay's partitioning
/// (one conversation is only ever reconciled by one worker at a time).
#[async_trait]
pub trait InboxStore: Send + Sync {
    /// Load the counter for a (user, conversation) pair
    async fn load(
        &self,
        user_id: UserId,
        conversation_id: ConversationId,
    ) -> ContractResult<Option<InboxCounter>>;

    /// Persist a counter (upsert)
    async fn save(&self, counter: &InboxCounter) -> ContractResult<()>;

    /// All counters recorded for a user
    async fn counters_for_user(&self, user_id: UserId) -> ContractResult<Vec<InboxCounter>>;
}
