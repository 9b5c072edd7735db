//! Join and leave handlers
//!
//! Joining checks conversation membership before any room state changes.
//! The first local join of a conversation subscribes this instance to
//! its fabric channel; the last leave releases it.

use std::sync::Arc;

use pulse_core::ConversationId;

use super::{CommandError, CommandResult};
use crate::connection::Connection;
use crate::server::GatewayState;

/// Handles `join` commands
pub struct JoinHandler;

impl JoinHandler {
    /// Join the issuing connection to a conversation
    pub async fn handle(
        state: &GatewayState,
        connection: &Arc<Connection>,
        conversation_id: ConversationId,
    ) -> CommandResult<()> {
        let is_participant = state
            .membership()
            .is_participant(conversation_id, connection.user_id())
            .await?;

        if !is_participant {
            tracing::debug!(
                connection_id = %connection.id(),
                user_id = %connection.user_id(),
                conversation_id = %conversation_id,
                "Join refused: not a participant"
            );
            return Err(CommandError::NotParticipant(conversation_id));
        }

        let first_local = state
            .registry()
            .join(connection.id(), conversation_id)
            .await
            .unwrap_or(false);

        if first_local {
            state.fanout().subscribe_room(conversation_id).await?;
        }

        tracing::debug!(
            connection_id = %connection.id(),
            conversation_id = %conversation_id,
            first_local,
            "Joined conversation"
        );

        Ok(())
    }
}

/// Handles `leave` commands
pub struct LeaveHandler;

impl LeaveHandler {
    /// Remove the issuing connection from a conversation
    pub async fn handle(
        state: &GatewayState,
        connection: &Arc<Connection>,
        conversation_id: ConversationId,
    ) -> CommandResult<()> {
        let last_local = state
            .registry()
            .leave(connection.id(), conversation_id)
            .await
            .unwrap_or(false);

        if last_local {
            // A missed unsubscribe only costs idle fabric traffic; the
            // next join re-subscribes.
            if let Err(e) = state.fanout().unsubscribe_room(conversation_id).await {
                tracing::warn!(
                    conversation_id = %conversation_id,
                    error = %e,
                    "Failed to release fabric channel"
                );
            }
        }

        tracing::debug!(
            connection_id = %connection.id(),
            conversation_id = %conversation_id,
            last_local,
            "Left conversation"
        );

        Ok(())
    }
}
