//! PostgreSQL implementation of the ConversationReader contract

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;

use pulse_core::{ContractResult, ConversationId, ConversationReader, UserId};

use crate::error::map_db_error;

/// Read model over the write path's committed message log
///
/// `sequence` is the per-conversation counter the write path assigns at
/// commit time; counting rows above a sequence is what the reconciler
/// uses instead of trusting its own arithmetic.
#[derive(Clone)]
pub struct PgConversationReader {
    pool: PgPool,
}

impl PgConversationReader {
    /// Create a new PgConversationReader
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConversationReader for PgConversationReader {
    #[instrument(skip(self))]
    async fn count_since(
        &self,
        conversation_id: ConversationId,
        after_sequence: u64,
        excluding: UserId,
    ) -> ContractResult<u64> {
        let after = i64::try_from(after_sequence).unwrap_or(i64::MAX);

        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM messages
            WHERE conversation_id = $1 AND sequence > $2 AND sender_id <> $3
            "#,
        )
        .bind(conversation_id.into_inner())
        .bind(after)
        .bind(excluding.into_inner())
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(u64::try_from(count).unwrap_or_default())
    }

    #[instrument(skip(self))]
    async fn latest_sequence(&self, conversation_id: ConversationId) -> ContractResult<u64> {
        let latest = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COALESCE(MAX(sequence), 0) FROM messages
            WHERE conversation_id = $1
            "#,
        )
        .bind(conversation_id.into_inner())
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(u64::try_from(latest).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PgConversationReader>();
    }
}
