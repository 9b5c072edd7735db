//! Partitioned event log on Redis Streams

mod event_log;

pub use event_log::{
    ConsumerConfig, EventLog, LogConsumer, LogEntry, STREAM_KEY_PREFIX,
};
