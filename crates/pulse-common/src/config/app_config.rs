//! Application configuration
//!
//! Loads configuration from environment variables (with `.env` support).

use serde::Deserialize;
use std::env;

/// Main application configuration, shared by the gateway and relay binaries
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub app: AppSettings,
    pub gateway: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub jwt: JwtConfig,
    pub presence: PresenceConfig,
    pub relay: RelayConfig,
    pub fabric: FabricConfig,
    pub connection: ConnectionConfig,
}

/// General application settings
#[derive(Debug, Clone, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default = "default_env")]
    pub env: Environment,
    /// Unique per-process identity; names this instance on the fabric and
    /// in the relay consumer group
    #[serde(default = "default_instance_id")]
    pub instance_id: String,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }
}

/// Listen address configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Database configuration (membership and read-model adapters)
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_db_max_connections")]
    pub max_connections: u32,
}

/// Redis configuration (fabric, presence, event log, inbox counters)
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,
    #[serde(default = "default_redis_max_connections")]
    pub max_connections: u32,
}

/// JWT verification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
}

/// Presence tracker configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PresenceConfig {
    /// Seconds without a heartbeat before a user counts as offline
    #[serde(default = "default_presence_horizon")]
    pub horizon_secs: u64,
    /// Interval between expiry sweeps
    #[serde(default = "default_presence_sweep")]
    pub sweep_secs: u64,
}

/// Relay consumer configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    /// Number of log partitions; fixed for the lifetime of the log
    #[serde(default = "default_relay_partitions")]
    pub partitions: u32,
    /// Worker tasks per relay process
    #[serde(default = "default_relay_workers")]
    pub workers: u32,
    #[serde(default = "default_consumer_group")]
    pub consumer_group: String,
    /// Blocking read timeout per poll, in milliseconds
    #[serde(default = "default_relay_block_ms")]
    pub block_ms: u64,
    /// Pending entries idle longer than this are reclaimed from dead consumers
    #[serde(default = "default_claim_idle_ms")]
    pub claim_idle_ms: u64,
    /// Max entries fetched per poll
    #[serde(default = "default_relay_batch")]
    pub batch_size: usize,
}

/// Broadcast fabric configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FabricConfig {
    /// How long the instance may run disconnected from the fabric before
    /// it stops admitting new connections
    #[serde(default = "default_fabric_grace")]
    pub grace_secs: u64,
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    /// Capacity of the in-process broadcast channel fanning fabric
    /// messages out to the dispatcher
    #[serde(default = "default_broadcast_buffer")]
    pub broadcast_buffer: usize,
}

/// Per-connection tuning
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionConfig {
    /// Outbound frame queue depth per connection; overflow drops frames
    #[serde(default = "default_queue_size")]
    pub queue_size: usize,
    /// Seconds without a client heartbeat before the socket is closed
    #[serde(default = "default_heartbeat_timeout")]
    pub heartbeat_timeout_secs: u64,
}

// Default value functions
fn default_app_name() -> String {
    "pulse".to_string()
}

fn default_env() -> Environment {
    Environment::Development
}

fn default_instance_id() -> String {
    let id = uuid::Uuid::new_v4().to_string();
    format!("pulse-{}", &id[..8])
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_db_max_connections() -> u32 {
    10
}

fn default_redis_max_connections() -> u32 {
    16
}

fn default_presence_horizon() -> u64 {
    30
}

fn default_presence_sweep() -> u64 {
    10
}

fn default_relay_partitions() -> u32 {
    16
}

fn default_relay_workers() -> u32 {
    4
}

fn default_consumer_group() -> String {
    "relay".to_string()
}

fn default_relay_block_ms() -> u64 {
    2000
}

fn default_claim_idle_ms() -> u64 {
    60_000
}

fn default_relay_batch() -> usize {
    32
}

fn default_fabric_grace() -> u64 {
    30
}

fn default_reconnect_delay_ms() -> u64 {
    1000
}

fn default_broadcast_buffer() -> usize {
    1024
}

fn default_queue_size() -> usize {
    100
}

fn default_heartbeat_timeout() -> u64 {
    60
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if required environment variables are missing
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Ok(Self {
            app: AppSettings {
                name: env::var("APP_NAME").unwrap_or_else(|_| default_app_name()),
                env: env::var("APP_ENV")
                    .ok()
                    .and_then(|s| match s.to_lowercase().as_str() {
                        "production" => Some(Environment::Production),
                        "staging" => Some(Environment::Staging),
                        "development" => Some(Environment::Development),
                        _ => None,
                    })
                    .unwrap_or_default(),
                instance_id: env::var("PULSE_INSTANCE_ID")
                    .unwrap_or_else(|_| default_instance_id()),
            },
            gateway: ServerConfig {
                host: env::var("GATEWAY_HOST").unwrap_or_else(|_| default_host()),
                port: env::var("GATEWAY_PORT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .ok_or(ConfigError::MissingVar("GATEWAY_PORT"))?,
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL")
                    .map_err(|_| ConfigError::MissingVar("DATABASE_URL"))?,
                max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_else(default_db_max_connections),
            },
            redis: RedisConfig {
                url: env::var("REDIS_URL").map_err(|_| ConfigError::MissingVar("REDIS_URL"))?,
                max_connections: env::var("REDIS_MAX_CONNECTIONS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_else(default_redis_max_connections),
            },
            jwt: JwtConfig {
                secret: env::var("JWT_SECRET").map_err(|_| ConfigError::MissingVar("JWT_SECRET"))?,
            },
            presence: PresenceConfig {
                horizon_secs: env::var("PRESENCE_HORIZON_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_else(default_presence_horizon),
                sweep_secs: env::var("PRESENCE_SWEEP_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_else(default_presence_sweep),
            },
            relay: RelayConfig {
                partitions: env::var("RELAY_PARTITIONS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_else(default_relay_partitions),
                workers: env::var("RELAY_WORKERS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_else(default_relay_workers),
                consumer_group: env::var("RELAY_CONSUMER_GROUP")
                    .unwrap_or_else(|_| default_consumer_group()),
                block_ms: env::var("RELAY_BLOCK_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_else(default_relay_block_ms),
                claim_idle_ms: env::var("RELAY_CLAIM_IDLE_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_else(default_claim_idle_ms),
                batch_size: env::var("RELAY_BATCH_SIZE")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_else(default_relay_batch),
            },
            fabric: FabricConfig {
                grace_secs: env::var("FABRIC_GRACE_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_else(default_fabric_grace),
                reconnect_delay_ms: env::var("FABRIC_RECONNECT_DELAY_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_else(default_reconnect_delay_ms),
                broadcast_buffer: env::var("FABRIC_BROADCAST_BUFFER")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_else(default_broadcast_buffer),
            },
            connection: ConnectionConfig {
                queue_size: env::var("CONNECTION_QUEUE_SIZE")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_else(default_queue_size),
                heartbeat_timeout_secs: env::var("HEARTBEAT_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_else(default_heartbeat_timeout),
            },
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}
