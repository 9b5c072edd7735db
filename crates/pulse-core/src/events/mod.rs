//! Relay events consumed from the durable log

mod partition;
mod relay_event;

pub use partition::partition_for;
pub use relay_event::{
    ConversationUpdatedEvent, MessageCreatedEvent, MessageReadEvent, PresenceChangedEvent,
    RelayEvent,
};
