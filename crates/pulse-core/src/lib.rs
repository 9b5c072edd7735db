//! # pulse-core
//!
//! Domain layer for the delivery core: typed identifiers, the relay event
//! model consumed from the durable log, the client wire catalog, and the
//! contracts the core needs from external collaborators. This crate has zero
//! dependencies on infrastructure (Redis, database, web framework, etc.).

pub mod contracts;
pub mod error;
pub mod events;
pub mod ids;
pub mod wire;

// Re-export commonly used types at crate root
pub use contracts::{ContractResult, ConversationReader, InboxCounter, InboxStore, Membership};
pub use error::CoreError;
pub use events::{
    ConversationUpdatedEvent, MessageCreatedEvent, MessageReadEvent, PresenceChangedEvent,
    RelayEvent, partition_for,
};
pub use ids::{ConversationId, IdParseError, MessageId, UserId};
pub use wire::{ClientCommand, Frame};
