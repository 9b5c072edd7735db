//! # pulse-gateway
//!
//! WebSocket edge of the delivery core: authenticated upgrades, a
//! per-instance connection registry, inbound command handling, and
//! fabric fan-in onto local sockets. Presence reads and health are
//! exposed over plain HTTP on the same listener.

pub mod commands;
pub mod connection;
pub mod fanout;
pub mod protocol;
pub mod server;

pub use server::{create_app, create_gateway_state, create_router, run, run_server, GatewayState};
