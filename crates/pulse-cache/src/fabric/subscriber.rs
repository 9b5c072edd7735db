//! Fabric subscriber
//!
//! Listens on Redis pub/sub channels and re-broadcasts received frames
//! to in-process consumers. The background listener reconnects on its
//! own and re-subscribes everything it was subscribed to before the
//! drop. Frames published while the connection is down are lost; the
//! health watch lets callers detect a prolonged outage.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use redis::Client;
use tokio::sync::{broadcast, mpsc, watch, RwLock};

use pulse_core::Frame;

use super::channels::FabricChannel;

/// Error type for subscriber operations
#[derive(Debug, thiserror::Error)]
pub enum SubscriberError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Subscriber task is gone")]
    ChannelClosed,
}

/// Result type for subscriber operations
pub type SubscriberResult<T> = Result<T, SubscriberError>;

/// Connection health of the background listener
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FabricStatus {
    /// Listener is connected and subscribed
    Connected,
    /// Listener lost its connection at `since` and is retrying
    Disconnected { since: Instant },
}

impl FabricStatus {
    /// True once the fabric has been down longer than the grace period
    #[must_use]
    pub fn degraded(&self, grace: Duration) -> bool {
        match self {
            Self::Connected => false,
            Self::Disconnected { since } => since.elapsed() > grace,
        }
    }
}

/// Message received from the fabric
#[derive(Debug, Clone)]
pub struct ReceivedMessage {
    /// Raw channel name the message arrived on
    pub channel: String,
    /// Parsed channel, `None` when the name is outside the fabric scheme
    pub target: Option<FabricChannel>,
    /// Parsed frame (if valid JSON)
    pub frame: Option<Frame>,
    /// Raw payload
    pub payload: String,
}

impl ReceivedMessage {
    /// Create from a raw Redis message
    fn from_redis(channel: String, payload: String) -> Self {
        let target = FabricChannel::parse(&channel);
        let frame = serde_json::from_str(&payload).ok();

        Self {
            channel,
            target,
            frame,
            payload,
        }
    }
}

/// Subscriber configuration
#[derive(Debug, Clone)]
pub struct SubscriberConfig {
    /// Redis connection URL
    pub redis_url: String,
    /// Channel buffer size for broadcast
    pub broadcast_buffer: usize,
    /// Reconnection delay in milliseconds
    pub reconnect_delay_ms: u64,
}

impl Default for SubscriberConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://127.0.0.1:6379".to_string(),
            broadcast_buffer: 1024,
            reconnect_delay_ms: 1000,
        }
    }
}

/// Fabric subscriber
pub struct Subscriber {
    #[allow(dead_code)]
    config: SubscriberConfig,
    /// Currently subscribed channel names
    subscribed: Arc<RwLock<HashSet<String>>>,
    /// Broadcast sender for received messages
    broadcast_tx: broadcast::Sender<ReceivedMessage>,
    /// Control channel for subscription management
    control_tx: mpsc::Sender<SubscriberCommand>,
    /// Health of the background listener
    status_rx: watch::Receiver<FabricStatus>,
}

/// Commands for subscription management
#[derive(Debug)]
enum SubscriberCommand {
    Subscribe(Vec<String>),
    Unsubscribe(Vec<String>),
    Shutdown,
}

impl Subscriber {
    /// Create a new subscriber and start the background listener
    pub fn new(config: SubscriberConfig) -> Self {
        let (broadcast_tx, _) = broadcast::channel(config.broadcast_buffer);
        let (control_tx, control_rx) = mpsc::channel(32);
        let (status_tx, status_rx) = watch::channel(FabricStatus::Disconnected {
            since: Instant::now(),
        });
        let subscribed = Arc::new(RwLock::new(HashSet::new()));

        let subscriber = Self {
            config: config.clone(),
            subscribed: subscribed.clone(),
            broadcast_tx: broadcast_tx.clone(),
            control_tx,
            status_rx,
        };

        // Start background listener
        tokio::spawn(Self::listener_loop(
            config,
            subscribed,
            broadcast_tx,
            control_rx,
            status_tx,
        ));

        subscriber
    }

    /// Background listener loop
    async fn listener_loop(
        config: SubscriberConfig,
        subscribed: Arc<RwLock<HashSet<String>>>,
        broadcast_tx: broadcast::Sender<ReceivedMessage>,
        mut control_rx: mpsc::Receiver<SubscriberCommand>,
        status_tx: watch::Sender<FabricStatus>,
    ) {
        loop {
            match Self::run_listener(
                &config,
                &subscribed,
                &broadcast_tx,
                &mut control_rx,
                &status_tx,
            )
            .await
            {
                Ok(should_stop) => {
                    if should_stop {
                        tracing::info!("Fabric subscriber shutting down");
                        break;
                    }
                    Self::mark_disconnected(&status_tx);
                }
                Err(e) => {
                    Self::mark_disconnected(&status_tx);
                    tracing::error!(error = %e, "Fabric subscriber error, reconnecting...");
                    tokio::time::sleep(tokio::time::Duration::from_millis(
                        config.reconnect_delay_ms,
                    ))
                    .await;
                }
            }
        }
    }

    /// Record the start of an outage, keeping the original timestamp
    /// across repeated reconnect failures
    fn mark_disconnected(status_tx: &watch::Sender<FabricStatus>) {
        let already_down = matches!(*status_tx.borrow(), FabricStatus::Disconnected { .. });
        if !already_down {
            status_tx.send_replace(FabricStatus::Disconnected {
                since: Instant::now(),
            });
        }
    }

    /// Run the listener until error or shutdown
    async fn run_listener(
        config: &SubscriberConfig,
        subscribed: &Arc<RwLock<HashSet<String>>>,
        broadcast_tx: &broadcast::Sender<ReceivedMessage>,
        control_rx: &mut mpsc::Receiver<SubscriberCommand>,
        status_tx: &watch::Sender<FabricStatus>,
    ) -> SubscriberResult<bool> {
        let client = Client::open(config.redis_url.as_str())?;
        let mut pubsub = client.get_async_pubsub().await?;

        // Re-subscribe everything that was active before the reconnect
        {
            let channels = subscribed.read().await;
            for channel in channels.iter() {
                pubsub.subscribe(channel).await?;
            }
        }

        status_tx.send_replace(FabricStatus::Connected);
        tracing::info!("Fabric subscriber connected to Redis");

        let mut stream = pubsub.on_message();

        loop {
            tokio::select! {
                // Handle incoming messages
                msg = stream.next() => {
                    match msg {
                        Some(msg) => {
                            let channel: String = msg.get_channel_name().to_string();
                            let payload: String = msg.get_payload().unwrap_or_default();

                            let received = ReceivedMessage::from_redis(channel.clone(), payload);

                            // Broadcast to all receivers (ignore send errors - no receivers)
                            let _ = broadcast_tx.send(received);

                            tracing::trace!(channel = %channel, "Received fabric message");
                        }
                        None => {
                            tracing::warn!("Fabric pub/sub stream ended");
                            return Ok(false);
                        }
                    }
                }

                // Handle control commands
                cmd = control_rx.recv() => {
                    match cmd {
                        Some(SubscriberCommand::Subscribe(channels)) => {
                            // on_message borrows pubsub; release the stream first
                            drop(stream);
                            for channel in &channels {
                                if let Err(e) = pubsub.subscribe(channel).await {
                                    tracing::error!(channel = %channel, error = %e, "Failed to subscribe");
                                } else {
                                    subscribed.write().await.insert(channel.clone());
                                    tracing::debug!(channel = %channel, "Subscribed to channel");
                                }
                            }
                            stream = pubsub.on_message();
                        }
                        Some(SubscriberCommand::Unsubscribe(channels)) => {
                            drop(stream);
                            for channel in &channels {
                                if let Err(e) = pubsub.unsubscribe(channel).await {
                                    tracing::error!(channel = %channel, error = %e, "Failed to unsubscribe");
                                } else {
                                    subscribed.write().await.remove(channel);
                                    tracing::debug!(channel = %channel, "Unsubscribed from channel");
                                }
                            }
                            stream = pubsub.on_message();
                        }
                        Some(SubscriberCommand::Shutdown) => {
                            return Ok(true);
                        }
                        None => {
                            tracing::warn!("Control channel closed");
                            return Ok(true);
                        }
                    }
                }
            }
        }
    }

    /// Subscribe to channels
    pub async fn subscribe(&self, channels: &[FabricChannel]) -> SubscriberResult<()> {
        let channel_names: Vec<String> = channels.iter().map(FabricChannel::name).collect();

        self.control_tx
            .send(SubscriberCommand::Subscribe(channel_names))
            .await
            .map_err(|_| SubscriberError::ChannelClosed)
    }

    /// Unsubscribe from channels
    pub async fn unsubscribe(&self, channels: &[FabricChannel]) -> SubscriberResult<()> {
        let channel_names: Vec<String> = channels.iter().map(FabricChannel::name).collect();

        self.control_tx
            .send(SubscriberCommand::Unsubscribe(channel_names))
            .await
            .map_err(|_| SubscriberError::ChannelClosed)
    }

    /// Get a receiver for broadcast messages
    #[must_use]
    pub fn receiver(&self) -> broadcast::Receiver<ReceivedMessage> {
        self.broadcast_tx.subscribe()
    }

    /// Get a watch on the listener's connection health
    #[must_use]
    pub fn status(&self) -> watch::Receiver<FabricStatus> {
        self.status_rx.clone()
    }

    /// Get currently subscribed channel names
    pub async fn subscribed_channels(&self) -> Vec<String> {
        self.subscribed.read().await.iter().cloned().collect()
    }

    /// Shutdown the subscriber
    pub async fn shutdown(&self) -> SubscriberResult<()> {
        self.control_tx
            .send(SubscriberCommand::Shutdown)
            .await
            .map_err(|_| SubscriberError::ChannelClosed)
    }
}

/// Builder for subscriber
pub struct SubscriberBuilder {
    config: SubscriberConfig,
    initial_channels: Vec<FabricChannel>,
}

impl SubscriberBuilder {
    /// Create a new builder
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: SubscriberConfig::default(),
            initial_channels: Vec::new(),
        }
    }

    /// Set Redis URL
    #[must_use]
    pub fn redis_url(mut self, url: impl Into<String>) -> Self {
        self.config.redis_url = url.into();
        self
    }

    /// Set broadcast buffer size
    #[must_use]
    pub fn broadcast_buffer(mut self, size: usize) -> Self {
        self.config.broadcast_buffer = size;
        self
    }

    /// Set reconnection delay
    #[must_use]
    pub fn reconnect_delay_ms(mut self, delay: u64) -> Self {
        self.config.reconnect_delay_ms = delay;
        self
    }

    /// Add an initial channel subscription
    #[must_use]
    pub fn subscribe(mut self, channel: FabricChannel) -> Self {
        self.initial_channels.push(channel);
        self
    }

    /// Build and start the subscriber
    pub async fn build(self) -> SubscriberResult<Subscriber> {
        let subscriber = Subscriber::new(self.config);

        if !self.initial_channels.is_empty() {
            subscriber.subscribe(&self.initial_channels).await?;
        }

        Ok(subscriber)
    }
}

impl Default for SubscriberBuilder {
    fn default() -> Self {
        Self::new()
    }
}
