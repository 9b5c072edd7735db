//! Fabric publisher
//!
//! Fire-and-forget delivery: `PUBLISH` reports how many subscribers
//! received the frame, and nobody retries. Instances that are not
//! subscribed at publish time simply miss the frame.

use redis::AsyncCommands;

use pulse_core::{ConversationId, Frame};

use crate::pool::{RedisPool, RedisResult};

use super::channels::FabricChannel;

/// Publishes delivery-ready frames onto the fabric
#[derive(Debug, Clone)]
pub struct FabricPublisher {
    pool: RedisPool,
}

impl FabricPublisher {
    #[must_use]
    pub fn new(pool: RedisPool) -> Self {
        Self { pool }
    }

    /// Publish a frame to a channel, returning the subscriber count
    pub async fn publish(&self, channel: &FabricChannel, frame: &Frame) -> RedisResult<u32> {
        let payload = serde_json::to_string(frame)?;
        let mut conn = self.pool.get().await?;
        let receivers: u32 = conn.publish(channel.name(), &payload).await?;

        tracing::debug!(
            channel = %channel,
            frame = frame.frame_type(),
            receivers,
            "Published frame"
        );

        Ok(receivers)
    }

    /// Publish a frame to one conversation's room channel
    pub async fn publish_to_room(
        &self,
        conversation_id: ConversationId,
        frame: &Frame,
    ) -> RedisResult<u32> {
        self.publish(&FabricChannel::Room(conversation_id), frame)
            .await
    }
}
