//! Configuration structs

mod app_config;

pub use app_config::{
    AppConfig, AppSettings, ConfigError, ConnectionConfig, DatabaseConfig, Environment,
    FabricConfig, JwtConfig, PresenceConfig, RedisConfig, RelayConfig, ServerConfig,
};
