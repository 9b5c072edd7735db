//! WebSocket handler
//!
//! Authentication happens before the upgrade; after it, each socket gets
//! an inbound command loop, an outbound frame loop, and a watchdog that
//! enforces heartbeats, token lifetime, and forced closes.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::http::{header, HeaderMap};
use axum::response::Response;
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::time::interval;
use uuid::Uuid;

use pulse_common::{AppError, Identity};
use pulse_core::Frame;

use crate::commands::CommandDispatcher;
use crate::connection::Connection;
use crate::protocol::CloseCode;

use super::{error_response, GatewayState};

/// Query parameters accepted on the upgrade request
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Token fallback for clients that cannot set headers
    token: Option<String>,
}

/// WebSocket upgrade handler
///
/// A missing or invalid token is refused with HTTP 401 before the
/// upgrade; an instance cut off from the fabric past its grace period
/// refuses with 503 so clients land on a healthy instance instead.
pub async fn gateway_handler(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    let grace = Duration::from_secs(state.config().fabric.grace_secs);
    if state.fanout().fabric_status().degraded(grace) {
        tracing::warn!("Refusing upgrade: fabric degraded past grace period");
        return error_response(&AppError::Degraded);
    }

    let Some(token) = bearer_token(&headers, &query) else {
        return error_response(&AppError::MissingAuth);
    };

    let identity = match state.verifier().verify(&token) {
        Ok(identity) => identity,
        Err(e) => {
            tracing::debug!(error = %e, "Rejected upgrade");
            return error_response(&e);
        }
    };

    ws.on_upgrade(move |socket| handle_socket(state, socket, identity))
}

/// Extract the token from the Authorization header, falling back to the
/// `token` query parameter
fn bearer_token(headers: &HeaderMap, query: &WsQuery) -> Option<String> {
    if let Some(value) = headers.get(header::AUTHORIZATION) {
        if let Some(token) = value.to_str().ok().and_then(|v| v.strip_prefix("Bearer ")) {
            return Some(token.trim().to_string());
        }
    }
    query.token.clone()
}

/// Drive one upgraded socket until it closes
async fn handle_socket(state: GatewayState, socket: WebSocket, identity: Identity) {
    let connection_id = Uuid::new_v4().to_string();
    let queue_size = state.config().connection.queue_size;

    let (tx, mut rx) = mpsc::channel::<Frame>(queue_size);
    let connection = state
        .registry()
        .register(connection_id.clone(), &identity, tx);

    tracing::info!(
        connection_id = %connection_id,
        user_id = %identity.user_id,
        username = %identity.username,
        "WebSocket connection established"
    );

    let (mut sink, mut stream) = socket.split();

    // Inbound: client frames to command dispatch
    let recv_state = state.clone();
    let recv_connection = connection.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(message) = stream.next().await {
            match message {
                Ok(Message::Text(text)) => {
                    handle_text_message(&recv_state, &recv_connection, &text).await;
                }
                Ok(Message::Binary(_)) => {
                    tracing::debug!(
                        connection_id = %recv_connection.id(),
                        "Binary frame received, closing"
                    );
                    return Some(CloseCode::DecodeError);
                }
                Ok(Message::Ping(_) | Message::Pong(_)) => {}
                Ok(Message::Close(_)) => {
                    tracing::debug!(
                        connection_id = %recv_connection.id(),
                        "Client closed the socket"
                    );
                    return None;
                }
                Err(e) => {
                    tracing::debug!(
                        connection_id = %recv_connection.id(),
                        error = %e,
                        "Socket error"
                    );
                    return Some(CloseCode::UnknownError);
                }
            }
        }
        None
    });

    // Watchdog: heartbeat timeout, token lifetime, forced closes
    let heartbeat_timeout =
        Duration::from_secs(state.config().connection.heartbeat_timeout_secs);
    let check_every =
        Duration::from_secs((state.config().connection.heartbeat_timeout_secs / 2).max(1));
    let watchdog_connection = connection.clone();
    let mut watchdog_task = tokio::spawn(async move {
        let mut ticker = interval(check_every);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if watchdog_connection.time_since_heartbeat().await > heartbeat_timeout {
                        tracing::debug!(
                            connection_id = %watchdog_connection.id(),
                            "Heartbeat timeout"
                        );
                        return CloseCode::HeartbeatTimeout;
                    }
                    if Utc::now() > watchdog_connection.token_expires_at() {
                        tracing::debug!(
                            connection_id = %watchdog_connection.id(),
                            "Session token expired"
                        );
                        return CloseCode::AuthExpired;
                    }
                }
                code = watchdog_connection.closed() => {
                    return code;
                }
            }
        }
    });

    // Outbound frames are sent from here so a close code can still be
    // written to the sink after either task decides to stop.
    let close_code = loop {
        tokio::select! {
            frame = rx.recv() => {
                let Some(frame) = frame else {
                    break None;
                };
                match serde_json::to_string(&frame) {
                    Ok(json) => {
                        if sink.send(Message::Text(json)).await.is_err() {
                            break Some(CloseCode::UnknownError);
                        }
                    }
                    Err(e) => {
                        tracing::error!(
                            connection_id = %connection.id(),
                            frame = frame.frame_type(),
                            error = %e,
                            "Failed to serialize frame"
                        );
                    }
                }
            }
            result = &mut recv_task => {
                break result.unwrap_or(Some(CloseCode::UnknownError));
            }
            code = &mut watchdog_task => {
                break Some(code.unwrap_or(CloseCode::UnknownError));
            }
        }
    };

    if let Some(code) = close_code {
        let frame = CloseFrame {
            code: code.as_u16(),
            reason: code.description().into(),
        };
        sink.send(Message::Close(Some(frame))).await.ok();
        tracing::info!(
            connection_id = %connection.id(),
            code = %code,
            "Connection closed by gateway"
        );
    } else {
        sink.close().await.ok();
    }

    recv_task.abort();
    watchdog_task.abort();

    cleanup_connection(&state, &connection).await;
}

/// Dispatch one text payload; failures become error frames, never closes
async fn handle_text_message(state: &GatewayState, connection: &Arc<Connection>, text: &str) {
    if let Err(e) = CommandDispatcher::dispatch(state, connection, text).await {
        tracing::debug!(
            connection_id = %connection.id(),
            code = e.code(),
            error = %e,
            "Command failed"
        );
        if connection.send(e.to_frame()).await.is_err() {
            tracing::warn!(
                connection_id = %connection.id(),
                "Failed to queue error frame"
            );
        }
    }
}

/// Unindex a finished connection and release fabric channels it was the
/// last local member of
///
/// Presence is left to its horizon; a socket drop is not an offline
/// signal.
async fn cleanup_connection(state: &GatewayState, connection: &Arc<Connection>) {
    let vacated = state.registry().remove(connection.id()).await;

    for conversation_id in vacated {
        if let Err(e) = state.fanout().unsubscribe_room(conversation_id).await {
            tracing::warn!(
                conversation_id = %conversation_id,
                error = %e,
                "Failed to release fabric channel"
            );
        }
    }

    tracing::info!(
        connection_id = %connection.id(),
        user_id = %connection.user_id(),
        age_secs = connection.age().as_secs(),
        "Connection cleaned up"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_token_prefers_header() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Bearer abc".parse().unwrap());
        let query = WsQuery {
            token: Some("from-query".to_string()),
        };
        assert_eq!(bearer_token(&headers, &query), Some("abc".to_string()));
    }

    #[test]
    fn test_bearer_token_falls_back_to_query() {
        let headers = HeaderMap::new();
        let query = WsQuery {
            token: Some("from-query".to_string()),
        };
        assert_eq!(
            bearer_token(&headers, &query),
            Some("from-query".to_string())
        );
    }

    #[test]
    fn test_bearer_token_missing() {
        let headers = HeaderMap::new();
        let query = WsQuery { token: None };
        assert_eq!(bearer_token(&headers, &query), None);
    }

    #[test]
    fn test_non_bearer_scheme_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Basic dXNlcjpwdw==".parse().unwrap());
        let query = WsQuery { token: None };
        assert_eq!(bearer_token(&headers, &query), None);
    }
}
