//! Presence heartbeats and the sweepable online index

mod store;

pub use store::{PresenceStore, HEARTBEAT_KEY_PREFIX, ONLINE_INDEX_KEY};
