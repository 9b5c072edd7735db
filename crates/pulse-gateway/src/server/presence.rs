//! Presence read endpoints
//!
//! Thin HTTP reads over the shared presence store, for callers that
//! want a point-in-time answer without holding a socket.

use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use pulse_common::AppError;
use pulse_core::UserId;

use super::{error_response, GatewayState};

/// Query parameters for the batch endpoint
#[derive(Debug, Deserialize)]
pub(crate) struct PresenceQuery {
    /// Comma-separated user IDs
    ids: String,
}

/// Report one user's presence
pub(crate) async fn single_status(
    State(state): State<GatewayState>,
    Path(user_id): Path<String>,
) -> Response {
    let user_id = match UserId::parse(&user_id) {
        Ok(id) => id,
        Err(e) => return error_response(&AppError::InvalidInput(e.to_string())),
    };

    match state.presence().is_online(user_id).await {
        Ok(online) => Json(json!({ "userId": user_id, "online": online })).into_response(),
        Err(e) => {
            tracing::warn!(user_id = %user_id, error = %e, "Presence lookup failed");
            error_response(&AppError::PresenceUnavailable(e.to_string()))
        }
    }
}

/// Report presence for a comma-separated list of users
pub(crate) async fn batch_status(
    State(state): State<GatewayState>,
    Query(query): Query<PresenceQuery>,
) -> Response {
    let mut user_ids = Vec::new();
    for raw in query.ids.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        match UserId::parse(raw) {
            Ok(id) => user_ids.push(id),
            Err(e) => {
                return error_response(&AppError::InvalidInput(format!("{raw}: {e}")));
            }
        }
    }

    match state.presence().batch_online(&user_ids).await {
        Ok(statuses) => {
            let body: Vec<_> = user_ids
                .iter()
                .zip(statuses)
                .map(|(user_id, online)| json!({ "userId": user_id, "online": online }))
                .collect();
            Json(body).into_response()
        }
        Err(e) => {
            tracing::warn!(error = %e, "Presence lookup failed");
            error_response(&AppError::PresenceUnavailable(e.to_string()))
        }
    }
}
