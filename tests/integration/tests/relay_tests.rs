//! Relay pipeline tests
//!
//! Drive committed events through translation and inbox reconciliation
//! together, over the in-memory backends, the way the relay worker does
//! per log entry. Single-rule reconciliation edge cases live with the
//! reconciler; these cover the combined flow.
//!
//! Run with: cargo test -p integration-tests --test relay_tests

use std::sync::Arc;

use pulse_cache::FabricChannel;
use pulse_core::{
    ConversationId, ConversationUpdatedEvent, Frame, InboxStore, MessageCreatedEvent, MessageId,
    MessageReadEvent, PresenceChangedEvent, RelayEvent, UserId,
};
use pulse_relay::{translate, Reconciler};
use pulse_store::{MemoryConversationReader, MemoryInboxStore, MemoryMembership};

struct Pipeline {
    reconciler: Reconciler,
    inbox: Arc<MemoryInboxStore>,
    reader: Arc<MemoryConversationReader>,
    membership: Arc<MemoryMembership>,
}

fn pipeline() -> Pipeline {
    let inbox = Arc::new(MemoryInboxStore::new());
    let reader = Arc::new(MemoryConversationReader::new());
    let membership = Arc::new(MemoryMembership::new());

    let reconciler = Reconciler::new(inbox.clone(), reader.clone(), membership.clone());

    Pipeline {
        reconciler,
        inbox,
        reader,
        membership,
    }
}

/// Commit a message to the log and return its event, as if the write
/// path had assigned the sequence and appended to the fabric log.
fn commit_message(
    pipeline: &Pipeline,
    conversation_id: ConversationId,
    sender_id: UserId,
    sequence: u64,
) -> RelayEvent {
    pipeline
        .reader
        .record_message(conversation_id, sequence, sender_id);
    RelayEvent::MessageCreated(MessageCreatedEvent::new(
        MessageId::generate(),
        conversation_id,
        sender_id,
        sequence,
        "hello",
    ))
}

#[tokio::test]
async fn test_committed_message_fans_out_and_counts() {
    let pipeline = pipeline();
    let conversation_id = ConversationId::generate();
    let alice = UserId::generate();
    let bob = UserId::generate();
    pipeline.membership.add_participant(conversation_id, alice);
    pipeline.membership.add_participant(conversation_id, bob);

    let event = commit_message(&pipeline, conversation_id, alice, 1);

    // Fanout side: one frame for the room, internals scrubbed
    let frames = translate(&event);
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].0, FabricChannel::Room(conversation_id));
    assert_eq!(frames[0].1.frame_type(), "message.new");
    let json = serde_json::to_string(&frames[0].1).expect("serialize frame");
    assert!(!json.contains("sequence"));

    // Inbox side: recipient is counted, sender is not
    pipeline.reconciler.apply(&event).await.expect("apply");

    let counter = pipeline
        .inbox
        .load(bob, conversation_id)
        .await
        .expect("load")
        .expect("bob should have a counter");
    assert_eq!(counter.unread, 1);
    assert_eq!(counter.last_applied_seq, 1);

    let sender_counter = pipeline
        .inbox
        .load(alice, conversation_id)
        .await
        .expect("load");
    assert!(sender_counter.is_none());
}

#[tokio::test]
async fn test_conversation_lifecycle_across_events() {
    let pipeline = pipeline();
    let conversation_id = ConversationId::generate();
    let alice = UserId::generate();
    let bob = UserId::generate();
    pipeline.membership.add_participant(conversation_id, alice);
    pipeline.membership.add_participant(conversation_id, bob);

    // Alice sends twice, bob reads up to the first message
    for sequence in 1..=2 {
        let event = commit_message(&pipeline, conversation_id, alice, sequence);
        pipeline.reconciler.apply(&event).await.expect("apply");
    }
    let receipt = RelayEvent::MessageRead(MessageReadEvent::new(
        MessageId::generate(),
        conversation_id,
        bob,
        1,
    ));
    assert_eq!(translate(&receipt)[0].1.frame_type(), "read.receipt");
    pipeline.reconciler.apply(&receipt).await.expect("apply");

    let counter = pipeline
        .inbox
        .load(bob, conversation_id)
        .await
        .expect("load")
        .expect("counter");
    assert_eq!(counter.unread, 1);
    assert_eq!(counter.last_read_seq, 1);

    // A rename reaches the room but touches no counters
    let rename = RelayEvent::ConversationUpdated(ConversationUpdatedEvent::new(
        conversation_id,
        Some("ops".to_string()),
    ));
    let frames = translate(&rename);
    assert_eq!(frames[0].0, FabricChannel::Room(conversation_id));
    pipeline.reconciler.apply(&rename).await.expect("apply");

    // Presence fans out on its own channel, also without counters
    let offline = RelayEvent::PresenceChanged(PresenceChangedEvent::new(alice, false));
    let frames = translate(&offline);
    assert_eq!(frames[0].0, FabricChannel::Presence);
    assert_eq!(
        frames[0].1,
        Frame::Presence {
            user_id: alice,
            online: false
        }
    );
    pipeline.reconciler.apply(&offline).await.expect("apply");

    let counter = pipeline
        .inbox
        .load(bob, conversation_id)
        .await
        .expect("load")
        .expect("counter");
    assert_eq!(counter.unread, 1);
}

#[tokio::test]
async fn test_inbox_summary_spans_conversations() {
    let pipeline = pipeline();
    let work = ConversationId::generate();
    let social = ConversationId::generate();
    let alice = UserId::generate();
    let bob = UserId::generate();
    for room in [work, social] {
        pipeline.membership.add_participant(room, alice);
        pipeline.membership.add_participant(room, bob);
    }

    for sequence in 1..=3 {
        let event = commit_message(&pipeline, work, alice, sequence);
        pipeline.reconciler.apply(&event).await.expect("apply");
    }
    let event = commit_message(&pipeline, social, alice, 1);
    pipeline.reconciler.apply(&event).await.expect("apply");

    let mut counters = pipeline
        .inbox
        .counters_for_user(bob)
        .await
        .expect("counters");
    counters.sort_by_key(|counter| counter.unread);

    assert_eq!(counters.len(), 2);
    assert_eq!(counters[0].conversation_id, social);
    assert_eq!(counters[0].unread, 1);
    assert_eq!(counters[1].conversation_id, work);
    assert_eq!(counters[1].unread, 3);

    // Alice only sent; nothing is unread for her
    let counters = pipeline
        .inbox
        .counters_for_user(alice)
        .await
        .expect("counters");
    assert!(counters.is_empty());
}

#[tokio::test]
async fn test_replayed_batch_leaves_counters_stable() {
    let pipeline = pipeline();
    let conversation_id = ConversationId::generate();
    let alice = UserId::generate();
    let bob = UserId::generate();
    pipeline.membership.add_participant(conversation_id, alice);
    pipeline.membership.add_participant(conversation_id, bob);

    // Bob's receipt for the first message trails alice's burst
    let batch = vec![
        commit_message(&pipeline, conversation_id, alice, 1),
        commit_message(&pipeline, conversation_id, alice, 2),
        commit_message(&pipeline, conversation_id, alice, 3),
        RelayEvent::MessageRead(MessageReadEvent::new(
            MessageId::generate(),
            conversation_id,
            bob,
            1,
        )),
    ];

    // At-least-once delivery: a consumer restart replays the whole batch
    for _ in 0..2 {
        for event in &batch {
            pipeline.reconciler.apply(event).await.expect("apply");
        }
    }

    let counter = pipeline
        .inbox
        .load(bob, conversation_id)
        .await
        .expect("load")
        .expect("counter");
    assert_eq!(counter.unread, 2);
    assert_eq!(counter.last_applied_seq, 3);
    assert_eq!(counter.last_read_seq, 1);
}
