//! Heartbeat handler
//!
//! A heartbeat refreshes two things: the connection's liveness for the
//! local watchdog, and the user's record in the shared presence store.
//! The ack certifies the socket, not the presence write; when the store
//! is unreachable the client gets an error frame plus the ack.

use std::sync::Arc;

use pulse_core::{Frame, PresenceChangedEvent, RelayEvent};

use super::{CommandError, CommandResult};
use crate::connection::Connection;
use crate::server::GatewayState;

/// Handles `heartbeat` commands
pub struct HeartbeatHandler;

impl HeartbeatHandler {
    /// Record liveness and refresh shared presence
    pub async fn handle(state: &GatewayState, connection: &Arc<Connection>) -> CommandResult<()> {
        connection.record_heartbeat().await;

        match state.presence().heartbeat(connection.user_id()).await {
            Ok(came_online) => {
                if came_online {
                    let event = RelayEvent::PresenceChanged(PresenceChangedEvent::new(
                        connection.user_id(),
                        true,
                    ));
                    if let Err(e) = state.event_log().append(&event).await {
                        tracing::warn!(
                            user_id = %connection.user_id(),
                            error = %e,
                            "Failed to record online transition"
                        );
                    }
                }
            }
            Err(e) => {
                tracing::warn!(
                    user_id = %connection.user_id(),
                    error = %e,
                    "Presence store unavailable, status unknown"
                );
                let frame =
                    Frame::error("PRESENCE_UNAVAILABLE", "Presence temporarily unavailable");
                if connection.send(frame).await.is_err() {
                    return Err(CommandError::Internal("Connection queue closed".to_string()));
                }
            }
        }

        connection
            .send(Frame::HeartbeatAck)
            .await
            .map_err(|_| CommandError::Internal("Failed to send heartbeat ack".to_string()))?;

        tracing::trace!(
            connection_id = %connection.id(),
            user_id = %connection.user_id(),
            "Heartbeat acknowledged"
        );

        Ok(())
    }
}
