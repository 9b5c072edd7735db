//! Broadcast fabric on Redis pub/sub
//!
//! Publishes delivery-ready frames to room channels and the global
//! presence channel, and feeds subscribed gateway instances through a
//! self-healing subscriber task.

mod channels;
mod publisher;
mod subscriber;

pub use channels::{FabricChannel, PRESENCE_CHANNEL, ROOM_CHANNEL_PREFIX};
pub use publisher::FabricPublisher;
pub use subscriber::{
    FabricStatus, ReceivedMessage, Subscriber, SubscriberBuilder, SubscriberConfig,
    SubscriberError, SubscriberResult,
};
