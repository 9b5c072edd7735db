//! Application error types
//!
//! One taxonomy for the whole delivery core. The important distinctions
//! are the ones callers branch on: handshake rejection (auth), per-join
//! rejection (authorization), per-connection drop (delivery), retry via
//! the log (relay), and unknown-not-offline (presence store).

use pulse_core::CoreError;
use serde::Serialize;
use std::fmt;

/// Application-wide error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Authentication errors (handshake rejection)
    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    TokenExpired,

    #[error("Missing authentication")]
    MissingAuth,

    // Authorization errors (per-operation rejection, never broadcast)
    #[error("Not a participant of conversation {0}")]
    NotParticipant(String),

    // Delivery errors (scoped to one connection, never the fan-out)
    #[error("Delivery dropped: {0}")]
    DeliveryDropped(String),

    // Relay errors (log entry stays unacknowledged, redelivery follows)
    #[error("Relay processing error: {0}")]
    Relay(String),

    // Presence store failures (status becomes unknown, never offline)
    #[error("Presence store unavailable: {0}")]
    PresenceUnavailable(String),

    // Degraded mode (fabric/store unreachable beyond the grace period)
    #[error("Instance degraded, not accepting connections")]
    Degraded,

    // Validation errors
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // Resource errors
    #[error("Resource not found: {0}")]
    NotFound(String),

    // Redis errors
    #[error("Cache error: {0}")]
    Cache(String),

    // Database errors
    #[error("Database error: {0}")]
    Database(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Internal errors
    #[error("Internal server error")]
    Internal(#[source] anyhow::Error),

    // Domain errors
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl AppError {
    /// Get HTTP status code for this error
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request
            Self::InvalidInput(_) => 400,

            // 401 Unauthorized
            Self::InvalidToken | Self::TokenExpired | Self::MissingAuth => 401,

            // 403 Forbidden
            Self::NotParticipant(_) => 403,

            // 404 Not Found
            Self::NotFound(_) => 404,

            // 503 Service Unavailable
            Self::Degraded | Self::PresenceUnavailable(_) => 503,

            // 500 Internal Server Error
            Self::DeliveryDropped(_)
            | Self::Relay(_)
            | Self::Cache(_)
            | Self::Database(_)
            | Self::Config(_)
            | Self::Internal(_)
            | Self::Core(_) => 500,
        }
    }

    /// Get the stable machine code used in error frames and API responses
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidToken => "INVALID_TOKEN",
            Self::TokenExpired => "TOKEN_EXPIRED",
            Self::MissingAuth => "MISSING_AUTH",
            Self::NotParticipant(_) => "NOT_PARTICIPANT",
            Self::DeliveryDropped(_) => "DELIVERY_DROPPED",
            Self::Relay(_) => "RELAY_ERROR",
            Self::PresenceUnavailable(_) => "PRESENCE_UNAVAILABLE",
            Self::Degraded => "DEGRADED",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Cache(_) => "CACHE_ERROR",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Core(_) => "CORE_ERROR",
        }
    }

    /// Check if this is a client error (4xx)
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        let status = self.status_code();
        (400..500).contains(&status)
    }

    /// Check if this is a server error (5xx)
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        let status = self.status_code();
        (500..600).contains(&status)
    }

    /// Create a not found error for a resource
    #[must_use]
    pub fn not_found(resource: impl fmt::Display) -> Self {
        Self::NotFound(resource.to_string())
    }

    /// Create an internal error from any error
    pub fn internal(err: impl Into<anyhow::Error>) -> Self {
        Self::Internal(err.into())
    }
}

/// Error response body for the HTTP surface
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl From<&AppError> for ErrorResponse {
    fn from(err: &AppError) -> Self {
        Self {
            code: err.error_code().to_string(),
            message: err.to_string(),
            details: None,
        }
    }
}

impl From<AppError> for ErrorResponse {
    fn from(err: AppError) -> Self {
        Self::from(&err)
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
