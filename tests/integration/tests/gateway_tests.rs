//! Gateway integration tests
//!
//! These run entirely in-process: in-memory membership, no Redis, no
//! database. Fabric-dependent behavior is asserted in its degraded form
//! (error frames and 503s, never hangs).
//!
//! Run with: cargo test -p integration-tests --test gateway_tests

use std::time::Duration;

use integration_tests::{
    expired_token, recv_close_code, recv_frame, send_binary, send_text, test_user,
    upgrade_rejection, wait_until, TestServer,
};
use pulse_core::{ConversationId, Frame};

// ============================================================================
// Health Tests
// ============================================================================

#[tokio::test]
async fn test_health_is_ok_within_grace() {
    let server = TestServer::start().await.expect("Failed to start server");

    let response = server.get("/health").await.expect("Request failed");
    assert_eq!(response.status().as_u16(), 200);

    let body: serde_json::Value = response.json().await.expect("JSON body");
    assert_eq!(body["status"], "ok");
    assert_eq!(body["fabric"], "disconnected");
    assert_eq!(body["connections"], 0);
}

#[tokio::test]
async fn test_health_degrades_past_grace() {
    let server = TestServer::start_with_grace(0)
        .await
        .expect("Failed to start server");
    tokio::time::sleep(Duration::from_millis(50)).await;

    let response = server.get("/health").await.expect("Request failed");
    assert_eq!(response.status().as_u16(), 503);

    let body: serde_json::Value = response.json().await.expect("JSON body");
    assert_eq!(body["status"], "degraded");
}

// ============================================================================
// Upgrade Authentication Tests
// ============================================================================

#[tokio::test]
async fn test_upgrade_without_token_is_refused() {
    let server = TestServer::start().await.expect("Failed to start server");

    let error = server
        .try_connect_ws(None)
        .await
        .expect_err("upgrade should be refused");
    assert_eq!(upgrade_rejection(&error), Some(401));
}

#[tokio::test]
async fn test_upgrade_with_garbage_token_is_refused() {
    let server = TestServer::start().await.expect("Failed to start server");

    let error = server
        .try_connect_ws(Some("not-a-jwt"))
        .await
        .expect_err("upgrade should be refused");
    assert_eq!(upgrade_rejection(&error), Some(401));
}

#[tokio::test]
async fn test_upgrade_with_expired_token_is_refused() {
    let server = TestServer::start().await.expect("Failed to start server");

    let error = server
        .try_connect_ws(Some(&expired_token()))
        .await
        .expect_err("upgrade should be refused");
    assert_eq!(upgrade_rejection(&error), Some(401));
}

#[tokio::test]
async fn test_degraded_instance_refuses_upgrades() {
    let server = TestServer::start_with_grace(0)
        .await
        .expect("Failed to start server");
    tokio::time::sleep(Duration::from_millis(50)).await;

    let user = test_user("miro");
    let error = server
        .try_connect_ws(Some(&user.token))
        .await
        .expect_err("upgrade should be refused");
    assert_eq!(upgrade_rejection(&error), Some(503));
}

#[tokio::test]
async fn test_header_auth_is_accepted() {
    let server = TestServer::start().await.expect("Failed to start server");
    let user = test_user("miro");

    let _ws = server
        .connect_ws_with_header(&user.token)
        .await
        .expect("upgrade should succeed");

    let registered = wait_until(
        || server.state.registry().connection_count() == 1,
        Duration::from_secs(2),
    )
    .await;
    assert!(registered, "connection should be registered");
    assert_eq!(server.state.registry().user_count(), 1);
}

// ============================================================================
// Command and Frame Tests
// ============================================================================

#[tokio::test]
async fn test_malformed_payload_gets_error_frame() {
    let server = TestServer::start().await.expect("Failed to start server");
    let user = test_user("miro");
    let mut ws = server.connect_ws(&user.token).await.expect("connect");

    send_text(&mut ws, "definitely not json")
        .await
        .expect("send");

    match recv_frame(&mut ws).await.expect("error frame") {
        Frame::Error { code, .. } => assert_eq!(code, "INVALID_INPUT"),
        other => panic!("expected error frame, got {other:?}"),
    }
}

#[tokio::test]
async fn test_join_without_membership_is_rejected() {
    let server = TestServer::start().await.expect("Failed to start server");
    let user = test_user("miro");
    let room = ConversationId::generate();
    let mut ws = server.connect_ws(&user.token).await.expect("connect");

    send_text(
        &mut ws,
        &format!(r#"{{"type":"join","conversationId":"{room}"}}"#),
    )
    .await
    .expect("send");

    match recv_frame(&mut ws).await.expect("error frame") {
        Frame::Error { code, .. } => assert_eq!(code, "NOT_PARTICIPANT"),
        other => panic!("expected error frame, got {other:?}"),
    }
    assert_eq!(server.state.registry().room_count(), 0);
}

#[tokio::test]
async fn test_join_then_heartbeat_flow() {
    let server = TestServer::start().await.expect("Failed to start server");
    let user = test_user("miro");
    let room = ConversationId::generate();
    server.membership.add_participant(room, user.user_id);

    let mut ws = server.connect_ws(&user.token).await.expect("connect");

    send_text(
        &mut ws,
        &format!(r#"{{"type":"join","conversationId":"{room}"}}"#),
    )
    .await
    .expect("send");

    let joined = wait_until(
        || server.state.registry().room_count() == 1,
        Duration::from_secs(2),
    )
    .await;
    assert!(joined, "room should gain a local connection");

    // The ack certifies the socket even though the presence store is
    // unreachable; the client is told presence is unknown first.
    send_text(&mut ws, r#"{"type":"heartbeat"}"#)
        .await
        .expect("send");

    match recv_frame(&mut ws).await.expect("presence error frame") {
        Frame::Error { code, .. } => assert_eq!(code, "PRESENCE_UNAVAILABLE"),
        other => panic!("expected error frame, got {other:?}"),
    }
    match recv_frame(&mut ws).await.expect("ack frame") {
        Frame::HeartbeatAck => {}
        other => panic!("expected heartbeat ack, got {other:?}"),
    }
}

#[tokio::test]
async fn test_typing_outside_joined_room_is_rejected() {
    let server = TestServer::start().await.expect("Failed to start server");
    let user = test_user("miro");
    let room = ConversationId::generate();
    server.membership.add_participant(room, user.user_id);

    let mut ws = server.connect_ws(&user.token).await.expect("connect");

    send_text(
        &mut ws,
        &format!(r#"{{"type":"typing","conversationId":"{room}","isTyping":true}}"#),
    )
    .await
    .expect("send");

    match recv_frame(&mut ws).await.expect("error frame") {
        Frame::Error { code, .. } => assert_eq!(code, "NOT_PARTICIPANT"),
        other => panic!("expected error frame, got {other:?}"),
    }
}

// ============================================================================
// Close and Cleanup Tests
// ============================================================================

#[tokio::test]
async fn test_binary_frame_closes_with_decode_error() {
    let server = TestServer::start().await.expect("Failed to start server");
    let user = test_user("miro");
    let mut ws = server.connect_ws(&user.token).await.expect("connect");

    send_binary(&mut ws, &[0xde, 0xad]).await.expect("send");

    let code = recv_close_code(&mut ws).await.expect("close code");
    assert_eq!(code, 4001);

    let cleaned = wait_until(
        || server.state.registry().connection_count() == 0,
        Duration::from_secs(2),
    )
    .await;
    assert!(cleaned, "connection should be unindexed after close");
}

#[tokio::test]
async fn test_client_close_cleans_up_registry() {
    let server = TestServer::start().await.expect("Failed to start server");
    let user = test_user("miro");
    let room = ConversationId::generate();
    server.membership.add_participant(room, user.user_id);

    let mut ws = server.connect_ws(&user.token).await.expect("connect");
    send_text(
        &mut ws,
        &format!(r#"{{"type":"join","conversationId":"{room}"}}"#),
    )
    .await
    .expect("send");
    wait_until(
        || server.state.registry().room_count() == 1,
        Duration::from_secs(2),
    )
    .await;

    ws.close(None).await.expect("close");

    let cleaned = wait_until(
        || {
            server.state.registry().connection_count() == 0
                && server.state.registry().room_count() == 0
        },
        Duration::from_secs(2),
    )
    .await;
    assert!(cleaned, "registry should be empty after the client closes");
}

#[tokio::test]
async fn test_shutdown_closes_sockets_with_reason() {
    let server = TestServer::start().await.expect("Failed to start server");
    let user = test_user("miro");
    let mut ws = server.connect_ws(&user.token).await.expect("connect");

    wait_until(
        || server.state.registry().connection_count() == 1,
        Duration::from_secs(2),
    )
    .await;

    server.state.registry().shutdown_all().await;

    let code = recv_close_code(&mut ws).await.expect("close code");
    assert_eq!(code, 4005);
}

// ============================================================================
// Presence Endpoint Tests
// ============================================================================

#[tokio::test]
async fn test_presence_rejects_malformed_id() {
    let server = TestServer::start().await.expect("Failed to start server");

    let response = server.get("/presence/not-a-uuid").await.expect("request");
    assert_eq!(response.status().as_u16(), 400);

    let body: serde_json::Value = response.json().await.expect("JSON body");
    assert_eq!(body["code"], "INVALID_INPUT");
}

#[tokio::test]
async fn test_presence_unavailable_without_store() {
    let server = TestServer::start().await.expect("Failed to start server");
    let user = test_user("miro");

    let response = server
        .get(&format!("/presence/{}", user.user_id))
        .await
        .expect("request");
    assert_eq!(response.status().as_u16(), 503);

    let body: serde_json::Value = response.json().await.expect("JSON body");
    assert_eq!(body["code"], "PRESENCE_UNAVAILABLE");
}

#[tokio::test]
async fn test_presence_batch_rejects_bad_ids() {
    let server = TestServer::start().await.expect("Failed to start server");

    let response = server.get("/presence?ids=zzz").await.expect("request");
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn test_presence_batch_empty_list_is_ok() {
    let server = TestServer::start().await.expect("Failed to start server");

    let response = server.get("/presence?ids=").await.expect("request");
    assert_eq!(response.status().as_u16(), 200);

    let body: serde_json::Value = response.json().await.expect("JSON body");
    assert_eq!(body, serde_json::json!([]));
}
