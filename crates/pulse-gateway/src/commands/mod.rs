//! Inbound command handling
//!
//! Parses client JSON into commands and routes each to its handler.
//! Rejections become `error` frames on the issuing connection; they
//! never close the socket and never reach the fabric.

pub mod error;
pub mod heartbeat;
pub mod rooms;
pub mod typing;

pub use error::{CommandError, CommandResult};
pub use heartbeat::HeartbeatHandler;
pub use rooms::{JoinHandler, LeaveHandler};
pub use typing::TypingHandler;

use std::sync::Arc;

use pulse_core::ClientCommand;

use crate::connection::Connection;
use crate::server::GatewayState;

/// Routes parsed client commands to their handlers
pub struct CommandDispatcher;

impl CommandDispatcher {
    /// Handle one raw text payload from a client
    pub async fn dispatch(
        state: &GatewayState,
        connection: &Arc<Connection>,
        text: &str,
    ) -> CommandResult<()> {
        let command: ClientCommand =
            serde_json::from_str(text).map_err(|e| CommandError::Malformed(e.to_string()))?;

        tracing::trace!(
            connection_id = %connection.id(),
            command = ?command,
            "Dispatching command"
        );

        match command {
            ClientCommand::Join { conversation_id } => {
                JoinHandler::handle(state, connection, conversation_id).await
            }
            ClientCommand::Leave { conversation_id } => {
                LeaveHandler::handle(state, connection, conversation_id).await
            }
            ClientCommand::Typing {
                conversation_id,
                is_typing,
            } => TypingHandler::handle(state, connection, conversation_id, is_typing).await,
            ClientCommand::Heartbeat => HeartbeatHandler::handle(state, connection).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionRegistry;
    use crate::fanout::{FanoutConfig, FanoutDispatcher};
    use chrono::{Duration as ChronoDuration, Utc};
    use pulse_cache::{RedisPool, RedisPoolConfig};
    use pulse_common::{
        AppConfig, AppSettings, ConnectionConfig, DatabaseConfig, Environment, FabricConfig,
        Identity, JwtConfig, PresenceConfig, RedisConfig, RelayConfig, ServerConfig,
    };
    use pulse_core::{ConversationId, Frame, UserId};
    use pulse_store::MemoryMembership;
    use tokio::sync::mpsc;

    const DEAD_REDIS_URL: &str = "redis://127.0.0.1:1";

    fn test_config() -> AppConfig {
        AppConfig {
            app: AppSettings {
                name: "pulse-test".to_string(),
                env: Environment::Development,
                instance_id: "test-1".to_string(),
            },
            gateway: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
            },
            database: DatabaseConfig {
                url: "postgres://localhost/unused".to_string(),
                max_connections: 1,
            },
            redis: RedisConfig {
                url: DEAD_REDIS_URL.to_string(),
                max_connections: 2,
            },
            jwt: JwtConfig {
                secret: "test-secret".to_string(),
            },
            presence: PresenceConfig {
                horizon_secs: 30,
                sweep_secs: 10,
            },
            relay: RelayConfig {
                partitions: 4,
                workers: 1,
                consumer_group: "relay".to_string(),
                block_ms: 100,
                claim_idle_ms: 1000,
                batch_size: 16,
            },
            fabric: FabricConfig {
                grace_secs: 30,
                reconnect_delay_ms: 50,
                broadcast_buffer: 64,
            },
            connection: ConnectionConfig {
                queue_size: 8,
                heartbeat_timeout_secs: 60,
            },
        }
    }

    async fn test_state(membership: Arc<MemoryMembership>) -> GatewayState {
        let registry = ConnectionRegistry::new_shared();
        let fanout = FanoutDispatcher::new(
            FanoutConfig {
                redis_url: DEAD_REDIS_URL.to_string(),
                ..FanoutConfig::default()
            },
            registry.clone(),
        )
        .await
        .expect("dispatcher should construct without a live fabric");

        let redis = RedisPool::new(RedisPoolConfig {
            url: DEAD_REDIS_URL.to_string(),
            max_size: 2,
        })
        .expect("pool construction is lazy");

        GatewayState::new(
            registry,
            Arc::new(fanout),
            membership,
            redis,
            test_config(),
        )
    }

    fn connect(
        state: &GatewayState,
        connection_id: &str,
        user_id: UserId,
    ) -> (Arc<Connection>, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(8);
        let identity = Identity {
            user_id,
            username: "miro".to_string(),
            expires_at: Utc::now() + ChronoDuration::hours(1),
        };
        let connection = state
            .registry()
            .register(connection_id.to_string(), &identity, tx);
        (connection, rx)
    }

    #[tokio::test]
    async fn test_malformed_payload_is_rejected() {
        let state = test_state(Arc::new(MemoryMembership::new())).await;
        let (connection, _rx) = connect(&state, "c1", UserId::generate());

        let result = CommandDispatcher::dispatch(&state, &connection, "not json").await;
        assert!(matches!(result, Err(CommandError::Malformed(_))));

        let result =
            CommandDispatcher::dispatch(&state, &connection, r#"{"type":"shrug"}"#).await;
        assert!(matches!(result, Err(CommandError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_join_requires_participation() {
        let state = test_state(Arc::new(MemoryMembership::new())).await;
        let user = UserId::generate();
        let room = ConversationId::generate();
        let (connection, _rx) = connect(&state, "c1", user);

        let payload = format!(r#"{{"type":"join","conversationId":"{room}"}}"#);
        let result = CommandDispatcher::dispatch(&state, &connection, &payload).await;

        assert!(matches!(result, Err(CommandError::NotParticipant(c)) if c == room));
        assert_eq!(state.registry().room_count(), 0);
        assert!(!connection.in_room(room).await);
    }

    #[tokio::test]
    async fn test_join_is_idempotent() {
        let membership = Arc::new(MemoryMembership::new());
        let user = UserId::generate();
        let room = ConversationId::generate();
        membership.add_participant(room, user);

        let state = test_state(membership).await;
        let (connection, _rx) = connect(&state, "c1", user);

        let payload = format!(r#"{{"type":"join","conversationId":"{room}"}}"#);
        CommandDispatcher::dispatch(&state, &connection, &payload)
            .await
            .expect("first join should succeed");
        assert!(connection.in_room(room).await);
        assert_eq!(state.registry().room_count(), 1);

        CommandDispatcher::dispatch(&state, &connection, &payload)
            .await
            .expect("re-join should be a no-op");
        assert_eq!(state.registry().room_count(), 1);
    }

    #[tokio::test]
    async fn test_leave_without_join_is_harmless() {
        let state = test_state(Arc::new(MemoryMembership::new())).await;
        let room = ConversationId::generate();
        let (connection, _rx) = connect(&state, "c1", UserId::generate());

        let payload = format!(r#"{{"type":"leave","conversationId":"{room}"}}"#);
        CommandDispatcher::dispatch(&state, &connection, &payload)
            .await
            .expect("leave should never fail the client");
    }

    #[tokio::test]
    async fn test_typing_requires_prior_join() {
        let membership = Arc::new(MemoryMembership::new());
        let user = UserId::generate();
        let room = ConversationId::generate();
        membership.add_participant(room, user);

        let state = test_state(membership).await;
        let (connection, _rx) = connect(&state, "c1", user);

        let payload =
            format!(r#"{{"type":"typing","conversationId":"{room}","isTyping":true}}"#);
        let result = CommandDispatcher::dispatch(&state, &connection, &payload).await;
        assert!(matches!(result, Err(CommandError::NotParticipant(_))));

        let join = format!(r#"{{"type":"join","conversationId":"{room}"}}"#);
        CommandDispatcher::dispatch(&state, &connection, &join)
            .await
            .expect("join should succeed");

        // Publish goes to a dead fabric, which is logged and swallowed
        CommandDispatcher::dispatch(&state, &connection, &payload)
            .await
            .expect("typing after join should succeed");
    }

    #[tokio::test]
    async fn test_heartbeat_acks_even_when_presence_is_down() {
        let state = test_state(Arc::new(MemoryMembership::new())).await;
        let (connection, mut rx) = connect(&state, "c1", UserId::generate());

        CommandDispatcher::dispatch(&state, &connection, r#"{"type":"heartbeat"}"#)
            .await
            .expect("heartbeat should succeed without the presence store");

        match rx.recv().await {
            Some(Frame::Error { code, .. }) => assert_eq!(code, "PRESENCE_UNAVAILABLE"),
            other => panic!("expected presence error frame, got {other:?}"),
        }
        match rx.recv().await {
            Some(Frame::HeartbeatAck) => {}
            other => panic!("expected heartbeat ack, got {other:?}"),
        }

        assert!(connection.time_since_heartbeat().await < std::time::Duration::from_secs(1));
    }
}
