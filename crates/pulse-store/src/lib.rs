//! # pulse-store
//!
//! Implementations of the delivery core's collaborator contracts.
//!
//! The Postgres backends are read models over tables the write path
//! owns (`conversation_participants`, `messages`); this crate never
//! writes to them. The in-memory backends serve tests and local runs
//! where no database is wired up.

mod error;

pub mod conversations;
pub mod membership;
pub mod memory;
pub mod pool;

// Re-export commonly used types
pub use conversations::PgConversationReader;
pub use membership::PgMembership;
pub use memory::{MemoryConversationReader, MemoryInboxStore, MemoryMembership};
pub use pool::{create_pool, PgPool};
