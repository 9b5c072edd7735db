//! Inbox reconciliation
//!
//! Keeps per-user unread counters in step with the committed message
//! log. Two rules make this safe to replay:
//!
//! - a message increments a recipient's counter only when its sequence
//!   is above the counter's high-water mark, so redelivered events are
//!   no-ops;
//! - a read receipt recomputes the count from the log instead of
//!   decrementing, so counters can never go negative or drift.

use std::sync::Arc;

use tracing::instrument;

use pulse_core::{
    ConversationId, ConversationReader, InboxCounter, InboxStore, Membership,
    MessageCreatedEvent, MessageReadEvent, RelayEvent, UserId,
};

use crate::error::{RelayError, RelayResult};

/// Applies committed events to inbox counters
pub struct Reconciler {
    inbox: Arc<dyn InboxStore>,
    reader: Arc<dyn ConversationReader>,
    membership: Arc<dyn Membership>,
}

impl Reconciler {
    #[must_use]
    pub fn new(
        inbox: Arc<dyn InboxStore>,
        reader: Arc<dyn ConversationReader>,
        membership: Arc<dyn Membership>,
    ) -> Self {
        Self {
            inbox,
            reader,
            membership,
        }
    }

    /// Apply one event's inbox effects. Events without inbox effects
    /// are no-ops here.
    pub async fn apply(&self, event: &RelayEvent) -> RelayResult<()> {
        match event {
            RelayEvent::MessageCreated(e) => self.apply_message_created(e).await,
            RelayEvent::MessageRead(e) => self.apply_message_read(e).await,
            RelayEvent::ConversationUpdated(_) | RelayEvent::PresenceChanged(_) => Ok(()),
        }
    }

    /// Bump unread for every participant except the sender
    #[instrument(skip(self, event), fields(conversation_id = %event.conversation_id, sequence = event.sequence))]
    async fn apply_message_created(&self, event: &MessageCreatedEvent) -> RelayResult<()> {
        let participants = self.membership.participants(event.conversation_id).await?;
        let recipients: Vec<UserId> = participants
            .into_iter()
            .filter(|user_id| *user_id != event.sender_id)
            .collect();

        let total = recipients.len();
        let mut failed = 0;

        // One slow or broken counter must not starve the others; finish
        // the pass, then report so the entry is redelivered.
        for user_id in recipients {
            if let Err(e) = self.bump_unread(user_id, event).await {
                tracing::warn!(
                    user_id = %user_id,
                    error = %e,
                    "Failed to update inbox counter"
                );
                failed += 1;
            }
        }

        if failed > 0 {
            return Err(RelayError::Incomplete { failed, total });
        }

        Ok(())
    }

    async fn bump_unread(&self, user_id: UserId, event: &MessageCreatedEvent) -> RelayResult<()> {
        let mut counter = self
            .inbox
            .load(user_id, event.conversation_id)
            .await?
            .unwrap_or_else(|| InboxCounter::new(user_id, event.conversation_id));

        // Replays and re-reads arrive at or below the high-water mark
        if event.sequence <= counter.last_applied_seq {
            return Ok(());
        }

        counter.unread += 1;
        counter.last_applied_seq = event.sequence;
        self.inbox.save(&counter).await?;

        Ok(())
    }

    /// Advance the read cursor and recompute unread from the log
    #[instrument(skip(self, event), fields(conversation_id = %event.conversation_id, user_id = %event.user_id))]
    async fn apply_message_read(&self, event: &MessageReadEvent) -> RelayResult<()> {
        let mut counter = self
            .inbox
            .load(event.user_id, event.conversation_id)
            .await?
            .unwrap_or_else(|| InboxCounter::new(event.user_id, event.conversation_id));

        // Receipts may arrive out of order; the cursor only moves forward
        if event.read_sequence > counter.last_read_seq {
            counter.last_read_seq = event.read_sequence;
        }

        counter.unread = self
            .reader
            .count_since(event.conversation_id, counter.last_read_seq, event.user_id)
            .await?;
        self.inbox.save(&counter).await?;

        Ok(())
    }

    /// Rebuild one counter entirely from the committed log, keeping only
    /// the read cursor. Recovers from lost or corrupted counter state.
    #[instrument(skip(self))]
    pub async fn rebuild(
        &self,
        user_id: UserId,
        conversation_id: ConversationId,
    ) -> RelayResult<InboxCounter> {
        let mut counter = self
            .inbox
            .load(user_id, conversation_id)
            .await?
            .unwrap_or_else(|| InboxCounter::new(user_id, conversation_id));

        counter.last_applied_seq = self.reader.latest_sequence(conversation_id).await?;
        counter.unread = self
            .reader
            .count_since(conversation_id, counter.last_read_seq, user_id)
            .await?;
        self.inbox.save(&counter).await?;

        tracing::info!(
            user_id = %user_id,
            conversation_id = %conversation_id,
            unread = counter.unread,
            "Rebuilt inbox counter"
        );

        Ok(counter)
    }
}
