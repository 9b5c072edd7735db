//! # pulse-common
//!
//! Shared utilities: configuration, error handling, bearer-token
//! verification, and telemetry setup.

pub mod auth;
pub mod config;
pub mod error;
pub mod telemetry;

// Re-export commonly used types at crate root
pub use auth::{Claims, Identity, TokenVerifier};
pub use config::{
    AppConfig, AppSettings, ConfigError, ConnectionConfig, DatabaseConfig, Environment,
    FabricConfig, JwtConfig, PresenceConfig, RedisConfig, RelayConfig, ServerConfig,
};
pub use error::{AppError, AppResult, ErrorResponse};
pub use telemetry::{init_tracing, try_init_tracing, TracingConfig, TracingError};
