//! Redis-backed inbox counters
//!
//! Counters are cache state, not truth: every value here can be
//! recomputed from the committed message log, so losing a key costs a
//! rebuild, never data. Each counter is stored as one JSON value, with
//! a per-user set of conversation ids for enumeration.

use async_trait::async_trait;
use redis::AsyncCommands;

use pulse_core::{ContractResult, ConversationId, CoreError, InboxCounter, InboxStore, UserId};

use crate::pool::{RedisPool, RedisPoolError};

const COUNTER_KEY_PREFIX: &str = "inbox:";
const USER_INDEX_PREFIX: &str = "inbox:user:";

/// Inbox counter persistence on Redis
#[derive(Debug, Clone)]
pub struct RedisInboxStore {
    pool: RedisPool,
}

impl RedisInboxStore {
    #[must_use]
    pub fn new(pool: RedisPool) -> Self {
        Self { pool }
    }

    fn counter_key(user_id: UserId, conversation_id: ConversationId) -> String {
        format!("{COUNTER_KEY_PREFIX}{user_id}:{conversation_id}")
    }

    fn user_index_key(user_id: UserId) -> String {
        format!("{USER_INDEX_PREFIX}{user_id}")
    }
}

fn storage_err(e: RedisPoolError) -> CoreError {
    CoreError::Storage(e.to_string())
}

#[async_trait]
impl InboxStore for RedisInboxStore {
    async fn load(
        &self,
        user_id: UserId,
        conversation_id: ConversationId,
    ) -> ContractResult<Option<InboxCounter>> {
        let key = Self::counter_key(user_id, conversation_id);
        self.pool.get_value(&key).await.map_err(storage_err)
    }

    async fn save(&self, counter: &InboxCounter) -> ContractResult<()> {
        let key = Self::counter_key(counter.user_id, counter.conversation_id);
        self.pool
            .set(&key, counter, None)
            .await
            .map_err(storage_err)?;

        let mut conn = self.pool.get().await.map_err(storage_err)?;
        conn.sadd::<_, _, ()>(
            Self::user_index_key(counter.user_id),
            counter.conversation_id.to_string(),
        )
        .await
        .map_err(|e| CoreError::Storage(e.to_string()))?;

        Ok(())
    }

    async fn counters_for_user(&self, user_id: UserId) -> ContractResult<Vec<InboxCounter>> {
        let mut conn = self.pool.get().await.map_err(storage_err)?;
        let members: Vec<String> = conn
            .smembers(Self::user_index_key(user_id))
            .await
            .map_err(|e| CoreError::Storage(e.to_string()))?;

        let mut counters = Vec::with_capacity(members.len());
        for member in members {
            let Ok(conversation_id) = ConversationId::parse(&member) else {
                tracing::warn!(user_id = %user_id, member = %member, "Skipping malformed index entry");
                continue;
            };
            // Index entries may outlive their counters; skip the holes
            if let Some(counter) = self.load(user_id, conversation_id).await? {
                counters.push(counter);
            }
        }

        Ok(counters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_shapes() {
        let user_id = UserId::generate();
        let conversation_id = ConversationId::generate();

        assert_eq!(
            RedisInboxStore::counter_key(user_id, conversation_id),
            format!("inbox:{user_id}:{conversation_id}")
        );
        assert_eq!(
            RedisInboxStore::user_index_key(user_id),
            format!("inbox:user:{user_id}")
        );
    }
}
