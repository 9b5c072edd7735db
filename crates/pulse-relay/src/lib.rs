//! # pulse-relay
//!
//! Consumes the durable event log and turns each committed event into
//! its delivery-side effects: inbox counter updates and frames on the
//! broadcast fabric. Also hosts the presence sweeper that converts
//! lapsed heartbeats into offline events.

pub mod error;
pub mod reconcile;
pub mod sweep;
pub mod translate;
pub mod worker;

pub use error::{RelayError, RelayResult};
pub use reconcile::Reconciler;
pub use sweep::PresenceSweeper;
pub use translate::translate;
pub use worker::RelayWorker;

use std::sync::Arc;
use std::time::Duration;

use pulse_cache::{
    ConsumerConfig, EventLog, FabricPublisher, LogConsumer, PresenceStore, RedisInboxStore,
    RedisPool,
};
use pulse_common::{AppConfig, AppError};
use pulse_core::{ConversationReader, InboxStore, Membership};
use pulse_store::{PgConversationReader, PgMembership};

/// Initialize all dependencies and run the relay until interrupted
pub async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Connecting to PostgreSQL...");
    let pg_pool = pulse_store::create_pool(&config.database)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    tracing::info!("PostgreSQL connection established");

    let redis_pool =
        RedisPool::from_config(&config.redis).map_err(|e| AppError::Cache(e.to_string()))?;

    let membership: Arc<dyn Membership> = Arc::new(PgMembership::new(pg_pool.clone()));
    let reader: Arc<dyn ConversationReader> = Arc::new(PgConversationReader::new(pg_pool));
    let inbox: Arc<dyn InboxStore> = Arc::new(RedisInboxStore::new(redis_pool.clone()));
    let reconciler = Arc::new(Reconciler::new(inbox, reader, membership));

    let publisher = FabricPublisher::new(redis_pool.clone());
    let log = EventLog::new(redis_pool.clone(), config.relay.partitions);

    for partition in 0..config.relay.partitions {
        log.ensure_group(partition, &config.relay.consumer_group)
            .await
            .map_err(|e| AppError::Cache(e.to_string()))?;
    }

    let workers = config.relay.workers.max(1);
    for worker_index in 0..workers {
        let partitions: Vec<u32> = (0..config.relay.partitions)
            .filter(|partition| partition % workers == worker_index)
            .collect();
        if partitions.is_empty() {
            continue;
        }

        let consumer = LogConsumer::new(
            redis_pool.clone(),
            ConsumerConfig {
                group: config.relay.consumer_group.clone(),
                consumer: format!("{}-w{worker_index}", config.app.instance_id),
                partitions,
                block_ms: config.relay.block_ms,
                batch_size: config.relay.batch_size,
                claim_idle_ms: config.relay.claim_idle_ms,
            },
        );
        let worker = RelayWorker::new(
            consumer,
            reconciler.clone(),
            publisher.clone(),
            Duration::from_millis(config.relay.claim_idle_ms),
        );
        tokio::spawn(worker.run());
    }

    tracing::info!(
        workers,
        partitions = config.relay.partitions,
        group = %config.relay.consumer_group,
        "Relay workers started"
    );

    let presence = PresenceStore::new(redis_pool, config.presence.horizon_secs);
    let sweeper = PresenceSweeper::new(
        presence,
        log,
        Duration::from_secs(config.presence.sweep_secs),
    );
    tokio::spawn(sweeper.run());

    tracing::info!(
        horizon_secs = config.presence.horizon_secs,
        sweep_secs = config.presence.sweep_secs,
        "Presence sweeper started"
    );

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| AppError::Internal(e.into()))?;
    tracing::info!("Relay shutting down");

    Ok(())
}
