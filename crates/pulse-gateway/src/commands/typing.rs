//! Typing indicator handler
//!
//! Typing is ephemeral: it goes straight to the conversation's fabric
//! channel and is never persisted or retried.

use std::sync::Arc;

use pulse_core::{ConversationId, Frame};

use super::{CommandError, CommandResult};
use crate::connection::Connection;
use crate::server::GatewayState;

/// Handles `typing` commands
pub struct TypingHandler;

impl TypingHandler {
    /// Publish a typing indicator for the issuing connection
    pub async fn handle(
        state: &GatewayState,
        connection: &Arc<Connection>,
        conversation_id: ConversationId,
        is_typing: bool,
    ) -> CommandResult<()> {
        // Participation was proven at join time; an un-joined room is
        // rejected without touching the database.
        if !connection.in_room(conversation_id).await {
            return Err(CommandError::NotParticipant(conversation_id));
        }

        let frame = Frame::Typing {
            conversation_id,
            user_id: connection.user_id(),
            is_typing,
        };

        if let Err(e) = state
            .publisher()
            .publish_to_room(conversation_id, &frame)
            .await
        {
            tracing::warn!(
                connection_id = %connection.id(),
                conversation_id = %conversation_id,
                error = %e,
                "Failed to publish typing indicator"
            );
        }

        Ok(())
    }
}
