//! Fan-in dispatcher
//!
//! One task per instance drains the fabric subscriber's broadcast
//! channel and hands each frame to the connection registry: room frames
//! go to that room's local connections, presence frames go to every
//! connection. Frames published on this very instance come back through
//! the same path, so local and remote senders are indistinguishable.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;

use pulse_cache::{
    FabricChannel, FabricStatus, ReceivedMessage, Subscriber, SubscriberBuilder, SubscriberError,
};
use pulse_core::ConversationId;

use crate::connection::ConnectionRegistry;

/// Configuration for the fan-in dispatcher
#[derive(Debug, Clone)]
pub struct FanoutConfig {
    /// Redis URL for the fabric subscription
    pub redis_url: String,
    /// Broadcast buffer size between subscriber and dispatcher
    pub broadcast_buffer: usize,
    /// Delay between reconnection attempts in milliseconds
    pub reconnect_delay_ms: u64,
}

impl Default for FanoutConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://127.0.0.1:6379".to_string(),
            broadcast_buffer: 1024,
            reconnect_delay_ms: 1000,
        }
    }
}

/// Routes fabric frames to local WebSocket connections
pub struct FanoutDispatcher {
    /// Registry holding the local connections
    registry: Arc<ConnectionRegistry>,
    /// Fabric subscriber
    subscriber: Subscriber,
    /// Whether the dispatch loop is running
    running: Arc<AtomicBool>,
}

impl FanoutDispatcher {
    /// Create a new dispatcher
    ///
    /// The presence channel is subscribed from the start; room channels
    /// come and go with local interest.
    pub async fn new(
        config: FanoutConfig,
        registry: Arc<ConnectionRegistry>,
    ) -> Result<Self, SubscriberError> {
        let subscriber = SubscriberBuilder::new()
            .redis_url(&config.redis_url)
            .broadcast_buffer(config.broadcast_buffer)
            .reconnect_delay_ms(config.reconnect_delay_ms)
            .subscribe(FabricChannel::Presence)
            .build()
            .await?;

        Ok(Self {
            registry,
            subscriber,
            running: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Subscribe this instance to a room's fabric channel
    pub async fn subscribe_room(
        &self,
        conversation_id: ConversationId,
    ) -> Result<(), SubscriberError> {
        self.subscriber
            .subscribe(&[FabricChannel::Room(conversation_id)])
            .await
    }

    /// Release a room's fabric channel
    pub async fn unsubscribe_room(
        &self,
        conversation_id: ConversationId,
    ) -> Result<(), SubscriberError> {
        self.subscriber
            .unsubscribe(&[FabricChannel::Room(conversation_id)])
            .await
    }

    /// Current health of the fabric link
    #[must_use]
    pub fn fabric_status(&self) -> FabricStatus {
        *self.subscriber.status().borrow()
    }

    /// Start the dispatch loop
    pub fn start(self: Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            tracing::warn!("Fan-in dispatcher is already running");
            return;
        }

        let dispatcher = self.clone();
        tokio::spawn(async move {
            dispatcher.run().await;
        });

        tracing::info!("Fan-in dispatcher started");
    }

    /// Stop the dispatch loop and the underlying subscriber
    pub async fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.subscriber.shutdown().await.ok();
        tracing::info!("Fan-in dispatcher stopped");
    }

    /// Check if the dispatch loop is running
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    async fn run(&self) {
        let mut receiver = self.subscriber.receiver();

        while self.running.load(Ordering::SeqCst) {
            match receiver.recv().await {
                Ok(msg) => self.handle_message(msg),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(lagged = n, "Fan-in dispatcher fell behind, frames lost");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::warn!("Fan-in dispatcher channel closed");
                    break;
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
        tracing::info!("Fan-in dispatcher loop ended");
    }

    /// Route one received fabric message to local connections
    fn handle_message(&self, msg: ReceivedMessage) {
        let Some(frame) = msg.frame else {
            tracing::debug!(channel = %msg.channel, "Discarding non-frame fabric payload");
            return;
        };

        match msg.target {
            Some(FabricChannel::Room(conversation_id)) => {
                let delivered = self.registry.deliver_local(conversation_id, &frame);
                tracing::trace!(
                    conversation_id = %conversation_id,
                    frame = frame.frame_type(),
                    delivered,
                    "Room frame dispatched"
                );
            }
            Some(FabricChannel::Presence) => {
                let delivered = self.registry.broadcast_all(&frame);
                tracing::trace!(
                    frame = frame.frame_type(),
                    delivered,
                    "Presence frame dispatched"
                );
            }
            None => {
                tracing::debug!(channel = %msg.channel, "Frame on unrecognized channel, ignoring");
            }
        }
    }
}

impl Drop for FanoutDispatcher {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

impl std::fmt::Debug for FanoutDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FanoutDispatcher")
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}
