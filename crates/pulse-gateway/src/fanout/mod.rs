//! Fabric fan-in
//!
//! Bridges the instance's fabric subscription onto local connections.

pub mod dispatcher;

pub use dispatcher::{FanoutConfig, FanoutDispatcher};
