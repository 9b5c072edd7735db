//! Gateway application state
//!
//! Shared by every route handler and socket task.

use std::sync::Arc;

use pulse_cache::{EventLog, FabricPublisher, PresenceStore, RedisPool};
use pulse_common::{AppConfig, TokenVerifier};
use pulse_core::Membership;

use crate::connection::ConnectionRegistry;
use crate::fanout::FanoutDispatcher;

/// Gateway application state
///
/// Cheap to clone; every field is either a handle or behind an `Arc`.
#[derive(Clone)]
pub struct GatewayState {
    /// Local connection registry
    registry: Arc<ConnectionRegistry>,
    /// Fabric fan-in dispatcher
    fanout: Arc<FanoutDispatcher>,
    /// Conversation membership contract
    membership: Arc<dyn Membership>,
    /// Fabric publisher for locally originated frames
    publisher: FabricPublisher,
    /// Shared presence store
    presence: PresenceStore,
    /// Durable event log producer
    event_log: EventLog,
    /// Token verifier for upgrade-time authentication
    verifier: TokenVerifier,
    /// Application configuration
    config: Arc<AppConfig>,
}

impl GatewayState {
    /// Assemble the state from its collaborators
    ///
    /// The Redis-backed pieces are derived here so the gateway and the
    /// relay agree on key layout from the same configuration.
    #[must_use]
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        fanout: Arc<FanoutDispatcher>,
        membership: Arc<dyn Membership>,
        redis: RedisPool,
        config: AppConfig,
    ) -> Self {
        let publisher = FabricPublisher::new(redis.clone());
        let presence = PresenceStore::new(redis.clone(), config.presence.horizon_secs);
        let event_log = EventLog::new(redis, config.relay.partitions);
        let verifier = TokenVerifier::new(&config.jwt.secret);

        Self {
            registry,
            fanout,
            membership,
            publisher,
            presence,
            event_log,
            verifier,
            config: Arc::new(config),
        }
    }

    /// Get the connection registry
    #[must_use]
    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Get the fabric fan-in dispatcher
    #[must_use]
    pub fn fanout(&self) -> &FanoutDispatcher {
        &self.fanout
    }

    /// Get the membership contract
    #[must_use]
    pub fn membership(&self) -> &dyn Membership {
        self.membership.as_ref()
    }

    /// Get the fabric publisher
    #[must_use]
    pub fn publisher(&self) -> &FabricPublisher {
        &self.publisher
    }

    /// Get the presence store
    #[must_use]
    pub fn presence(&self) -> &PresenceStore {
        &self.presence
    }

    /// Get the event log producer
    #[must_use]
    pub fn event_log(&self) -> &EventLog {
        &self.event_log
    }

    /// Get the token verifier
    #[must_use]
    pub fn verifier(&self) -> &TokenVerifier {
        &self.verifier
    }

    /// Get the application configuration
    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}

impl std::fmt::Debug for GatewayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayState")
            .field("connections", &self.registry.connection_count())
            .field("fanout", &self.fanout)
            .finish_non_exhaustive()
    }
}
