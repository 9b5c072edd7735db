//! Redis layer for the delivery core
//!
//! This crate provides:
//! - Redis connection pooling (deadpool)
//! - The broadcast fabric: pub/sub publisher and resilient subscriber
//! - Presence heartbeats with a sweepable online index
//! - The partitioned event log on Redis Streams
//! - Durable per-user unread counters

pub mod fabric;
pub mod inbox;
pub mod log;
pub mod pool;
pub mod presence;

// Re-export main types
pub use fabric::{
    FabricChannel, FabricPublisher, FabricStatus, ReceivedMessage, Subscriber, SubscriberBuilder,
    SubscriberConfig, SubscriberError,
};
pub use inbox::RedisInboxStore;
pub use log::{ConsumerConfig, EventLog, LogConsumer, LogEntry};
pub use pool::{create_shared_pool, RedisPool, RedisPoolConfig, RedisPoolError, SharedRedisPool};
pub use presence::PresenceStore;
