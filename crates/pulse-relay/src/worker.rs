//! Relay worker
//!
//! One worker owns a fixed subset of log partitions and drives them
//! through a consumer group: drain own pending entries first (restart
//! replay), then block for new ones, periodically reclaiming entries
//! stuck pending on dead consumers. An entry is acknowledged only after
//! its inbox effects are applied and its frames are published; stopping
//! a worker mid-entry just means redelivery, which the reconciler
//! absorbs.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use pulse_cache::{FabricPublisher, LogConsumer, LogEntry};
use pulse_core::RelayEvent;

use crate::error::RelayResult;
use crate::reconcile::Reconciler;
use crate::translate::translate;

/// Pause after a failed batch so a poison entry cannot hot-spin the loop
const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Consumer-group worker over a fixed partition set
pub struct RelayWorker {
    consumer: LogConsumer,
    reconciler: Arc<Reconciler>,
    publisher: FabricPublisher,
    claim_every: Duration,
}

impl RelayWorker {
    #[must_use]
    pub fn new(
        consumer: LogConsumer,
        reconciler: Arc<Reconciler>,
        publisher: FabricPublisher,
        claim_every: Duration,
    ) -> Self {
        Self {
            consumer,
            reconciler,
            publisher,
            claim_every,
        }
    }

    /// Run until the process exits
    pub async fn run(self) {
        // Claim immediately at boot to pick up entries a previous
        // incarnation left pending
        let mut last_claim = Instant::now()
            .checked_sub(self.claim_every)
            .unwrap_or_else(Instant::now);

        loop {
            if last_claim.elapsed() >= self.claim_every {
                match self.consumer.claim_idle().await {
                    Ok(claimed) => {
                        if self.handle_batch(claimed).await {
                            tokio::time::sleep(RETRY_DELAY).await;
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, "Idle-claim pass failed"),
                }
                last_claim = Instant::now();
            }

            let batch = match self.next_batch().await {
                Ok(batch) => batch,
                Err(e) => {
                    tracing::error!(error = %e, "Log read failed, backing off");
                    tokio::time::sleep(RETRY_DELAY).await;
                    continue;
                }
            };

            if self.handle_batch(batch).await {
                tokio::time::sleep(RETRY_DELAY).await;
            }
        }
    }

    /// Pending entries first; only a clean pending list may read new ones
    async fn next_batch(&self) -> RelayResult<Vec<LogEntry>> {
        let pending = self.consumer.read_pending().await?;
        if !pending.is_empty() {
            tracing::debug!(count = pending.len(), "Replaying pending entries");
            return Ok(pending);
        }
        Ok(self.consumer.read_new().await?)
    }

    /// Returns true when any entry in the batch failed
    async fn handle_batch(&self, entries: Vec<LogEntry>) -> bool {
        let mut had_failure = false;
        for entry in entries {
            if !self.handle_entry(entry).await {
                had_failure = true;
            }
        }
        had_failure
    }

    /// Process one entry end to end. Returns false when the entry was
    /// left unacked for redelivery.
    async fn handle_entry(&self, entry: LogEntry) -> bool {
        match RelayEvent::decode(&entry.kind, &entry.payload) {
            Ok(Some(event)) => {
                if let Err(e) = self.process(&event).await {
                    tracing::warn!(
                        partition = entry.partition,
                        entry_id = %entry.entry_id,
                        kind = %entry.kind,
                        error = %e,
                        "Event processing failed, leaving entry pending"
                    );
                    return false;
                }
                self.ack(&entry).await
            }
            // Unknown kinds come from newer producers; skip, don't wedge
            Ok(None) => {
                tracing::warn!(
                    partition = entry.partition,
                    entry_id = %entry.entry_id,
                    kind = %entry.kind,
                    "Skipping event of unknown kind"
                );
                self.ack(&entry).await
            }
            // Malformed payloads will not improve on redelivery
            Err(e) => {
                tracing::warn!(
                    partition = entry.partition,
                    entry_id = %entry.entry_id,
                    kind = %entry.kind,
                    error = %e,
                    "Skipping malformed event"
                );
                self.ack(&entry).await
            }
        }
    }

    /// Inbox effects first, then fan-out. If publishing fails after the
    /// inbox was updated, redelivery repeats both; the reconciler side is
    /// idempotent and clients tolerate a duplicate frame.
    async fn process(&self, event: &RelayEvent) -> RelayResult<()> {
        self.reconciler.apply(event).await?;

        for (channel, frame) in translate(event) {
            self.publisher.publish(&channel, &frame).await?;
        }

        Ok(())
    }

    async fn ack(&self, entry: &LogEntry) -> bool {
        match self.consumer.ack(entry.partition, &entry.entry_id).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    partition = entry.partition,
                    entry_id = %entry.entry_id,
                    error = %e,
                    "Failed to ack entry"
                );
                false
            }
        }
    }
}
