//! PostgreSQL implementation of the Membership contract

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

use pulse_core::{ContractResult, ConversationId, Membership, UserId};

use crate::error::map_db_error;

/// Membership checks against the write path's participant table
#[derive(Clone)]
pub struct PgMembership {
    pool: PgPool,
}

impl PgMembership {
    /// Create a new PgMembership
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Membership for PgMembership {
    #[instrument(skip(self))]
    async fn is_participant(
        &self,
        conversation_id: ConversationId,
        user_id: UserId,
    ) -> ContractResult<bool> {
        let result = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM conversation_participants
                WHERE conversation_id = $1 AND user_id = $2
            )
            "#,
        )
        .bind(conversation_id.into_inner())
        .bind(user_id.into_inner())
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(result)
    }

    #[instrument(skip(self))]
    async fn participants(&self, conversation_id: ConversationId) -> ContractResult<Vec<UserId>> {
        let rows = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT user_id FROM conversation_participants
            WHERE conversation_id = $1
            ORDER BY user_id
            "#,
        )
        .bind(conversation_id.into_inner())
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(rows.into_iter().map(UserId::new).collect())
    }
}
