//! Connection management
//!
//! Tracks every open WebSocket on this instance and indexes it by user
//! and by joined conversation.

pub mod connection;
pub mod registry;

pub use connection::{Connection, ConnectionState};
pub use registry::ConnectionRegistry;
