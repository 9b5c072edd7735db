//! Durable unread counters

mod store;

pub use store::RedisInboxStore;
