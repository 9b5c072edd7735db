//! Event-to-frame translation
//!
//! Pure mapping from committed events to the frames clients may see.
//! This is the privacy boundary: internal fields (log sequences,
//! `key_ref`) stop here and never enter a frame.

use pulse_cache::FabricChannel;
use pulse_core::{Frame, RelayEvent};

/// Translate one event into its outbound frames and their channels
#[must_use]
pub fn translate(event: &RelayEvent) -> Vec<(FabricChannel, Frame)> {
    match event {
        RelayEvent::MessageCreated(e) => vec![(
            FabricChannel::Room(e.conversation_id),
            Frame::MessageNew {
                id: e.message_id,
                conversation_id: e.conversation_id,
                sender_id: e.sender_id,
                body: e.body.clone(),
                created_at: e.created_at,
            },
        )],

        RelayEvent::MessageRead(e) => vec![(
            FabricChannel::Room(e.conversation_id),
            Frame::ReadReceipt {
                message_id: e.message_id,
                conversation_id: e.conversation_id,
                user_id: e.user_id,
                read_at: e.read_at,
            },
        )],

        RelayEvent::ConversationUpdated(e) => vec![(
            FabricChannel::Room(e.conversation_id),
            Frame::ConversationUpdated {
                conversation_id: e.conversation_id,
                name: e.name.clone(),
                updated_at: e.updated_at,
            },
        )],

        RelayEvent::PresenceChanged(e) => vec![(
            FabricChannel::Presence,
            Frame::Presence {
                user_id: e.user_id,
                online: e.online,
            },
        )],
    }
}
