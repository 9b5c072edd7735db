//! In-memory contract implementations
//!
//! Backends for tests and database-free local runs. They honor the same
//! contracts as the Postgres backends, with plain maps behind
//! `parking_lot` locks; no lock is held across an await point.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use pulse_core::{
    ContractResult, ConversationId, ConversationReader, InboxCounter, InboxStore, Membership,
    UserId,
};

/// In-memory conversation membership
#[derive(Debug, Default)]
pub struct MemoryMembership {
    rooms: RwLock<HashMap<ConversationId, Vec<UserId>>>,
}

impl MemoryMembership {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a participant
    pub fn add_participant(&self, conversation_id: ConversationId, user_id: UserId) {
        let mut rooms = self.rooms.write();
        let members = rooms.entry(conversation_id).or_default();
        if !members.contains(&user_id) {
            members.push(user_id);
        }
    }
}

#[async_trait]
impl Membership for MemoryMembership {
    async fn is_participant(
        &self,
        conversation_id: ConversationId,
        user_id: UserId,
    ) -> ContractResult<bool> {
        Ok(self
            .rooms
            .read()
            .get(&conversation_id)
            .is_some_and(|members| members.contains(&user_id)))
    }

    async fn participants(&self, conversation_id: ConversationId) -> ContractResult<Vec<UserId>> {
        Ok(self
            .rooms
            .read()
            .get(&conversation_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// In-memory committed-message log
#[derive(Debug, Default)]
pub struct MemoryConversationReader {
    /// (sequence, sender) pairs per conversation
    messages: RwLock<HashMap<ConversationId, Vec<(u64, UserId)>>>,
}

impl MemoryConversationReader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a committed message
    pub fn record_message(
        &self,
        conversation_id: ConversationId,
        sequence: u64,
        sender_id: UserId,
    ) {
        self.messages
            .write()
            .entry(conversation_id)
            .or_default()
            .push((sequence, sender_id));
    }
}

#[async_trait]
impl ConversationReader for MemoryConversationReader {
    async fn count_since(
        &self,
        conversation_id: ConversationId,
        after_sequence: u64,
        excluding: UserId,
    ) -> ContractResult<u64> {
        let count = self
            .messages
            .read()
            .get(&conversation_id)
            .map(|messages| {
                messages
                    .iter()
                    .filter(|(sequence, sender)| *sequence > after_sequence && *sender != excluding)
                    .count()
            })
            .unwrap_or_default();

        Ok(u64::try_from(count).unwrap_or_default())
    }

    async fn latest_sequence(&self, conversation_id: ConversationId) -> ContractResult<u64> {
        let latest = self
            .messages
            .read()
            .get(&conversation_id)
            .and_then(|messages| messages.iter().map(|(sequence, _)| *sequence).max())
            .unwrap_or_default();

        Ok(latest)
    }
}

/// In-memory inbox counter store
#[derive(Debug, Default)]
pub struct MemoryInboxStore {
    counters: RwLock<HashMap<(UserId, ConversationId), InboxCounter>>,
}

impl MemoryInboxStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InboxStore for MemoryInboxStore {
    async fn load(
        &self,
        user_id: UserId,
        conversation_id: ConversationId,
    ) -> ContractResult<Option<InboxCounter>> {
        Ok(self
            .counters
            .read()
            .get(&(user_id, conversation_id))
            .cloned())
    }

    async fn save(&self, counter: &InboxCounter) -> ContractResult<()> {
        self.counters.write().insert(
            (counter.user_id, counter.conversation_id),
            counter.clone(),
        );
        Ok(())
    }

    async fn counters_for_user(&self, user_id: UserId) -> ContractResult<Vec<InboxCounter>> {
        Ok(self
            .counters
            .read()
            .values()
            .filter(|counter| counter.user_id == user_id)
            .cloned()
            .collect())
    }
}
