//! Presence sweeper
//!
//! Periodically scans the online index for users whose heartbeat lapsed,
//! claims each transition, and appends the offline event to the log. The
//! claim (a ZREM that only one sweeper wins) is what keeps exactly one
//! offline event per lapse when several relay instances sweep the same
//! index.

use std::time::Duration;

use tokio::time::MissedTickBehavior;

use pulse_cache::{EventLog, PresenceStore};
use pulse_core::{PresenceChangedEvent, RelayEvent};

use crate::error::RelayResult;

/// Upper bound on candidates examined per tick
const SWEEP_BATCH: isize = 128;

/// Scans for lapsed presences and emits offline events
pub struct PresenceSweeper {
    presence: PresenceStore,
    log: EventLog,
    interval: Duration,
}

impl PresenceSweeper {
    #[must_use]
    pub fn new(presence: PresenceStore, log: EventLog, interval: Duration) -> Self {
        Self {
            presence,
            log,
            interval,
        }
    }

    /// Run until the process exits
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match self.sweep_once().await {
                Ok(swept) if swept > 0 => {
                    tracing::info!(swept, "Swept lapsed presences");
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "Presence sweep failed"),
            }
        }
    }

    /// One sweep pass; returns how many offline transitions this
    /// instance claimed and published
    pub async fn sweep_once(&self) -> RelayResult<usize> {
        let candidates = self.presence.expired_candidates(SWEEP_BATCH).await?;
        let mut swept = 0;

        for user_id in candidates {
            if self.presence.claim_offline(user_id).await? {
                let event = RelayEvent::PresenceChanged(PresenceChangedEvent::new(user_id, false));
                self.log.append(&event).await?;
                swept += 1;
            }
        }

        Ok(swept)
    }
}
