//! Durable event log on Redis Streams
//!
//! Events are appended to one of a fixed set of streams, `events:{p}`,
//! chosen by hashing the event's partition key. Everything for one
//! conversation (or one user, for presence) lands on the same stream,
//! so stream order is delivery order for that scope.
//!
//! Consumers read through a consumer group: delivered-but-unacked
//! entries sit in the group's pending list and are re-read before any
//! new entries, and entries stuck pending on a dead consumer are
//! reclaimed with `XAUTOCLAIM`.

use redis::streams::{
    StreamAutoClaimOptions, StreamAutoClaimReply, StreamReadOptions, StreamReadReply,
};
use redis::AsyncCommands;

use pulse_core::{partition_for, RelayEvent};

use crate::pool::{RedisPool, RedisResult};

/// Prefix for partition stream keys
pub const STREAM_KEY_PREFIX: &str = "events:";

/// One entry read from a partition stream
#[derive(Debug, Clone)]
pub struct LogEntry {
    /// Partition the entry was read from
    pub partition: u32,
    /// Stream entry id (`millis-seq`)
    pub entry_id: String,
    /// Event kind field
    pub kind: String,
    /// JSON payload field
    pub payload: String,
}

/// Producer-side handle for the event log
#[derive(Debug, Clone)]
pub struct EventLog {
    pool: RedisPool,
    partitions: u32,
}

impl EventLog {
    #[must_use]
    pub fn new(pool: RedisPool, partitions: u32) -> Self {
        Self { pool, partitions }
    }

    /// Number of partition streams
    #[must_use]
    pub fn partitions(&self) -> u32 {
        self.partitions
    }

    /// Stream key for a partition
    #[must_use]
    pub fn stream_key(partition: u32) -> String {
        format!("{STREAM_KEY_PREFIX}{partition}")
    }

    /// Append an event to its partition, returning the entry id
    pub async fn append(&self, event: &RelayEvent) -> RedisResult<String> {
        let (kind, payload) = event.encode()?;
        let partition = partition_for(&event.partition_key(), self.partitions);
        let key = Self::stream_key(partition);

        let mut conn = self.pool.get().await?;
        let entry_id: String = conn
            .xadd(&key, "*", &[("kind", kind), ("payload", payload.as_str())])
            .await?;

        tracing::debug!(partition, kind, entry_id = %entry_id, "Appended event");
        Ok(entry_id)
    }

    /// Create the consumer group on one partition stream if it does not
    /// exist yet, creating the stream itself as needed
    pub async fn ensure_group(&self, partition: u32, group: &str) -> RedisResult<()> {
        let mut conn = self.pool.get().await?;
        let created: redis::RedisResult<String> = conn
            .xgroup_create_mkstream(Self::stream_key(partition), group, "0")
            .await;

        match created {
            Ok(_) => {
                tracing::info!(partition, group, "Created consumer group");
                Ok(())
            }
            // The group already exists; nothing to do
            Err(e) if e.code() == Some("BUSYGROUP") => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Configuration for one log consumer
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// Consumer group shared by all relay workers
    pub group: String,
    /// This consumer's name within the group
    pub consumer: String,
    /// Partitions this consumer owns
    pub partitions: Vec<u32>,
    /// How long a read for new entries may block
    pub block_ms: u64,
    /// Maximum entries per read
    pub batch_size: usize,
    /// Pending entries idle longer than this may be reclaimed
    pub claim_idle_ms: u64,
}

/// Group consumer over a fixed set of partitions
#[derive(Debug, Clone)]
pub struct LogConsumer {
    pool: RedisPool,
    config: ConsumerConfig,
}

impl LogConsumer {
    #[must_use]
    pub fn new(pool: RedisPool, config: ConsumerConfig) -> Self {
        Self { pool, config }
    }

    /// Entries already delivered to this consumer but never acked
    ///
    /// These must be drained before reading new entries, otherwise a
    /// restart would reorder a partition.
    pub async fn read_pending(&self) -> RedisResult<Vec<LogEntry>> {
        self.read(false).await
    }

    /// New entries, blocking up to the configured timeout
    pub async fn read_new(&self) -> RedisResult<Vec<LogEntry>> {
        self.read(true).await
    }

    async fn read(&self, new_entries: bool) -> RedisResult<Vec<LogEntry>> {
        if self.config.partitions.is_empty() {
            return Ok(Vec::new());
        }

        let keys: Vec<String> = self
            .config
            .partitions
            .iter()
            .map(|p| EventLog::stream_key(*p))
            .collect();
        let ids: Vec<&str> = if new_entries {
            vec![">"; keys.len()]
        } else {
            vec!["0"; keys.len()]
        };

        let mut options = StreamReadOptions::default()
            .group(&self.config.group, &self.config.consumer)
            .count(self.config.batch_size);
        if new_entries {
            options = options.block(usize::try_from(self.config.block_ms).unwrap_or(usize::MAX));
        }

        let mut conn = self.pool.get().await?;
        let reply: Option<StreamReadReply> =
            conn.xread_options(&keys, &ids, &options).await?;

        Ok(reply.map(collect_entries).unwrap_or_default())
    }

    /// Acknowledge one processed entry
    pub async fn ack(&self, partition: u32, entry_id: &str) -> RedisResult<()> {
        let mut conn = self.pool.get().await?;
        conn.xack::<_, _, _, i64>(EventLog::stream_key(partition), &self.config.group, &[entry_id])
            .await?;
        Ok(())
    }

    /// Claim entries stuck pending on other consumers of the group
    ///
    /// Claimed entries move into this consumer's pending list and come
    /// back here for processing; they are acked through the normal path.
    pub async fn claim_idle(&self) -> RedisResult<Vec<LogEntry>> {
        let mut conn = self.pool.get().await?;
        let mut entries = Vec::new();

        for partition in &self.config.partitions {
            // StreamAutoClaimOptions is not Clone and xautoclaim_options
            // consumes it, so build a fresh (identical) value per partition.
            let options = StreamAutoClaimOptions::default().count(self.config.batch_size);
            let reply: StreamAutoClaimReply = conn
                .xautoclaim_options(
                    EventLog::stream_key(*partition),
                    &self.config.group,
                    &self.config.consumer,
                    self.config.claim_idle_ms,
                    "0-0",
                    options,
                )
                .await?;

            if !reply.deleted_ids.is_empty() {
                tracing::warn!(
                    partition,
                    deleted = reply.deleted_ids.len(),
                    "Pending entries vanished from stream"
                );
            }

            for stream_id in reply.claimed {
                tracing::debug!(partition, entry_id = %stream_id.id, "Claimed idle entry");
                entries.push(entry_from_stream_id(*partition, stream_id));
            }
        }

        Ok(entries)
    }
}

fn collect_entries(reply: StreamReadReply) -> Vec<LogEntry> {
    let mut entries = Vec::new();

    for stream_key in reply.keys {
        let Some(partition) = partition_from_key(&stream_key.key) else {
            tracing::warn!(key = %stream_key.key, "Reply for a key outside the log");
            continue;
        };
        for stream_id in stream_key.ids {
            entries.push(entry_from_stream_id(partition, stream_id));
        }
    }

    entries
}

fn entry_from_stream_id(partition: u32, stream_id: redis::streams::StreamId) -> LogEntry {
    let kind: String = stream_id.get("kind").unwrap_or_default();
    let payload: String = stream_id.get("payload").unwrap_or_default();

    LogEntry {
        partition,
        entry_id: stream_id.id,
        kind,
        payload,
    }
}

fn partition_from_key(key: &str) -> Option<u32> {
    key.strip_prefix(STREAM_KEY_PREFIX)?.parse().ok()
}
