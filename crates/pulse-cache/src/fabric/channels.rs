//! Fabric channel names
//!
//! Channel naming scheme:
//! - `room:{conversation_id}` - frames for one conversation
//! - `presence` - global presence transitions, every instance subscribes

use pulse_core::ConversationId;

/// Prefix for per-conversation channels
pub const ROOM_CHANNEL_PREFIX: &str = "room:";

/// Global presence channel
pub const PRESENCE_CHANNEL: &str = "presence";

/// Typed fabric channel
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FabricChannel {
    /// Frames scoped to one conversation
    Room(ConversationId),
    /// Presence transitions, fanned out to everyone online
    Presence,
}

impl FabricChannel {
    /// Full channel name on the wire
    #[must_use]
    pub fn name(&self) -> String {
        match self {
            Self::Room(conversation_id) => format!("{ROOM_CHANNEL_PREFIX}{conversation_id}"),
            Self::Presence => PRESENCE_CHANNEL.to_string(),
        }
    }

    /// Parse a channel name back into its typed form
    ///
    /// Returns `None` for names outside the fabric naming scheme.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        if name == PRESENCE_CHANNEL {
            return Some(Self::Presence);
        }
        let id = name.strip_prefix(ROOM_CHANNEL_PREFIX)?;
        ConversationId::parse(id).ok().map(Self::Room)
    }
}

impl std::fmt::Display for FabricChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_channel_name() {
        let id = ConversationId::generate();
        let channel = FabricChannel::Room(id);
        assert_eq!(channel.name(), format!("room:{id}"));
    }

    #[test]
    fn test_presence_channel_name() {
        assert_eq!(FabricChannel::Presence.name(), "presence");
    }

    #[test]
    fn test_parse_round_trip() {
        let id = ConversationId::generate();
        let channel = FabricChannel::Room(id);
        assert_eq!(FabricChannel::parse(&channel.name()), Some(channel));
        assert_eq!(
            FabricChannel::parse("presence"),
            Some(FabricChannel::Presence)
        );
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert_eq!(FabricChannel::parse("room:not-a-uuid"), None);
        assert_eq!(FabricChannel::parse("sessions:abc"), None);
        assert_eq!(FabricChannel::parse(""), None);
    }
}
