//! Gateway server setup
//!
//! Routes, state wiring, and the serve loop.

pub mod handler;
pub mod presence;
pub mod state;

pub use handler::gateway_handler;
pub use state::GatewayState;

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use pulse_cache::{FabricStatus, RedisPool};
use pulse_common::{AppConfig, AppError, ErrorResponse};
use pulse_core::Membership;
use pulse_store::PgMembership;

use crate::connection::ConnectionRegistry;
use crate::fanout::{FanoutConfig, FanoutDispatcher};

/// Create the gateway router
pub fn create_router() -> Router<GatewayState> {
    Router::new()
        .route("/ws", get(gateway_handler))
        .route("/health", get(health_check))
        .route("/presence", get(presence::batch_status))
        .route("/presence/:user_id", get(presence::single_status))
}

/// Health check endpoint
///
/// Reports fabric connectivity and local connection counts. Degraded
/// instances answer 503 so load balancers stop routing upgrades here.
async fn health_check(State(state): State<GatewayState>) -> Response {
    let status = state.fanout().fabric_status();
    let grace = Duration::from_secs(state.config().fabric.grace_secs);
    let degraded = status.degraded(grace);

    let body = json!({
        "status": if degraded { "degraded" } else { "ok" },
        "fabric": match status {
            FabricStatus::Connected => "connected",
            FabricStatus::Disconnected { .. } => "disconnected",
        },
        "connections": state.registry().connection_count(),
        "users": state.registry().user_count(),
        "rooms": state.registry().room_count(),
    });

    let code = if degraded {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    (code, Json(body)).into_response()
}

/// Render an application error as an HTTP response
pub(crate) fn error_response(err: &AppError) -> Response {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(ErrorResponse::from(err))).into_response()
}

/// Build the complete application with middleware
pub fn create_app(state: GatewayState) -> Router {
    create_router()
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Initialize all dependencies and assemble the gateway state
pub async fn create_gateway_state(config: AppConfig) -> Result<GatewayState, AppError> {
    tracing::info!("Connecting to PostgreSQL...");
    let pg_pool = pulse_store::create_pool(&config.database)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    let membership: Arc<dyn Membership> = Arc::new(PgMembership::new(pg_pool));
    tracing::info!("PostgreSQL connection established");

    let redis =
        RedisPool::from_config(&config.redis).map_err(|e| AppError::Cache(e.to_string()))?;

    let registry = ConnectionRegistry::new_shared();

    let fanout_config = FanoutConfig {
        redis_url: config.redis.url.clone(),
        broadcast_buffer: config.fabric.broadcast_buffer,
        reconnect_delay_ms: config.fabric.reconnect_delay_ms,
    };
    let fanout = Arc::new(
        FanoutDispatcher::new(fanout_config, registry.clone())
            .await
            .map_err(|e| AppError::Cache(format!("Failed to start fabric fan-in: {e}")))?,
    );
    fanout.clone().start();

    Ok(GatewayState::new(registry, fanout, membership, redis, config))
}

/// Run the gateway server on the given address
pub async fn run_server(app: Router, addr: &str, state: GatewayState) -> Result<(), AppError> {
    tracing::info!("Starting gateway server on {addr}");

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| AppError::Config(format!("Failed to bind to {addr}: {e}")))?;

    tracing::info!("Gateway listening on ws://{addr}/ws");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state))
        .await
        .map_err(|e| AppError::Config(format!("Server error: {e}")))?;

    Ok(())
}

/// Wait for ctrl-c, then close every socket before the serve loop drains
async fn shutdown_signal(state: GatewayState) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }

    tracing::info!("Shutdown signal received");
    state.registry().shutdown_all().await;
    state.fanout().stop().await;
}

/// Run the complete gateway with the given configuration
pub async fn run(config: AppConfig) -> Result<(), AppError> {
    let addr = config.gateway.address();
    let state = create_gateway_state(config).await?;
    let app = create_app(state.clone());

    run_server(app, &addr, state).await
}
