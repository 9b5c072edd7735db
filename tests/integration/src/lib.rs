//! Integration test utilities for the delivery core
//!
//! This crate provides helpers for running end-to-end tests against
//! the WebSocket gateway and the relay pipeline.

pub mod fixtures;
pub mod helpers;

pub use fixtures::*;
pub use helpers::*;
