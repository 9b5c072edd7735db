//! Deadpool-backed Redis connection pool
//!
//! Every Redis-facing component in the workspace borrows connections from
//! this pool. The pool is lazy: connections are established on first use,
//! so constructing it never touches the network.

use std::sync::Arc;

use deadpool_redis::{Config, Connection, Pool, PoolError, Runtime};
use redis::AsyncCommands;
use serde::{de::DeserializeOwned, Serialize};

use pulse_common::RedisConfig;

/// Redis pool errors
#[derive(Debug, thiserror::Error)]
pub enum RedisPoolError {
    #[error("Failed to create Redis pool: {0}")]
    CreatePool(String),

    #[error("Failed to get connection from pool: {0}")]
    GetConnection(#[from] PoolError),

    #[error("Redis command failed: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result alias for Redis operations
pub type RedisResult<T> = Result<T, RedisPoolError>;

/// Configuration for the Redis pool
#[derive(Debug, Clone)]
pub struct RedisPoolConfig {
    /// Redis connection URL (redis://host:port)
    pub url: String,
    /// Maximum number of pooled connections
    pub max_size: usize,
}

impl Default for RedisPoolConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            max_size: 16,
        }
    }
}

impl From<&RedisConfig> for RedisPoolConfig {
    fn from(config: &RedisConfig) -> Self {
        Self {
            url: config.url.clone(),
            max_size: config.max_connections as usize,
        }
    }
}

/// Connection pool wrapper around deadpool-redis
#[derive(Clone)]
pub struct RedisPool {
    pool: Pool,
}

impl RedisPool {
    /// Create a new Redis connection pool
    pub fn new(config: RedisPoolConfig) -> RedisResult<Self> {
        let pool = Config::from_url(&config.url)
            .builder()
            .map_err(|e| RedisPoolError::CreatePool(e.to_string()))?
            .max_size(config.max_size)
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(|e| RedisPoolError::CreatePool(e.to_string()))?;

        // Log the target without credentials
        let target = config.url.split('@').next_back().unwrap_or("<invalid>");
        tracing::info!(redis = %target, max_size = config.max_size, "Redis pool created");

        Ok(Self { pool })
    }

    /// Create a pool from the shared application config
    pub fn from_config(config: &RedisConfig) -> RedisResult<Self> {
        Self::new(RedisPoolConfig::from(config))
    }

    /// Borrow a connection from the pool
    pub async fn get(&self) -> RedisResult<Connection> {
        Ok(self.pool.get().await?)
    }

    /// Pool status (size, available connections)
    #[must_use]
    pub fn status(&self) -> deadpool_redis::Status {
        self.pool.status()
    }

    /// Round-trip a PING to verify Redis is reachable
    pub async fn health_check(&self) -> RedisResult<()> {
        let mut conn = self.get().await?;
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        if pong == "PONG" {
            Ok(())
        } else {
            Err(RedisPoolError::Redis(redis::RedisError::from((
                redis::ErrorKind::ResponseError,
                "unexpected PING reply",
            ))))
        }
    }

    /// Store a JSON-serialized value, optionally with a TTL
    pub async fn set<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl_seconds: Option<u64>,
    ) -> RedisResult<()> {
        let mut conn = self.get().await?;
        let json = serde_json::to_string(value)?;

        match ttl_seconds {
            Some(ttl) => conn.set_ex::<_, _, ()>(key, json, ttl).await?,
            None => conn.set::<_, _, ()>(key, json).await?,
        }

        Ok(())
    }

    /// Fetch and deserialize a JSON value
    pub async fn get_value<T: DeserializeOwned>(&self, key: &str) -> RedisResult<Option<T>> {
        let mut conn = self.get().await?;
        let value: Option<String> = conn.get(key).await?;

        match value {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Check whether a key exists
    pub async fn exists(&self, key: &str) -> RedisResult<bool> {
        let mut conn = self.get().await?;
        Ok(conn.exists(key).await?)
    }
}

impl std::fmt::Debug for RedisPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = self.pool.status();
        f.debug_struct("RedisPool")
            .field("size", &status.size)
            .field("available", &status.available)
            .finish_non_exhaustive()
    }
}

/// Shared handle used across tasks
pub type SharedRedisPool = Arc<RedisPool>;

/// Create a shared Redis pool from config
pub fn create_shared_pool(config: RedisPoolConfig) -> RedisResult<SharedRedisPool> {
    Ok(Arc::new(RedisPool::new(config)?))
}
