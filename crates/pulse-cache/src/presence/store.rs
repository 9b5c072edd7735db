//! Presence store
//!
//! A user is online while their heartbeat key exists. The key is written
//! with `SET .. EX horizon GET` so each heartbeat atomically reports
//! whether it opened a fresh presence (prior value absent) or extended an
//! existing one. Alongside the volatile key, members are scored into a
//! ZSET index by last-heartbeat time; the sweep scans that index for
//! users whose TTL has lapsed and claims each offline transition by
//! removing the index entry. ZREM removes exactly once, so exactly one
//! sweeper wins even with several instances sweeping concurrently.

use chrono::Utc;
use redis::AsyncCommands;

use pulse_core::UserId;

use crate::pool::{RedisPool, RedisResult};

/// Prefix for per-user heartbeat keys
pub const HEARTBEAT_KEY_PREFIX: &str = "presence:hb:";

/// ZSET of online users scored by last heartbeat (unix millis)
pub const ONLINE_INDEX_KEY: &str = "presence:online";

/// Redis-backed presence tracking
#[derive(Debug, Clone)]
pub struct PresenceStore {
    pool: RedisPool,
    horizon_secs: u64,
}

impl PresenceStore {
    #[must_use]
    pub fn new(pool: RedisPool, horizon_secs: u64) -> Self {
        Self { pool, horizon_secs }
    }

    fn heartbeat_key(user_id: UserId) -> String {
        format!("{HEARTBEAT_KEY_PREFIX}{user_id}")
    }

    /// Record a heartbeat, returning `true` when it opened a fresh
    /// presence (the user was offline before this beat)
    pub async fn heartbeat(&self, user_id: UserId) -> RedisResult<bool> {
        let now_ms = Utc::now().timestamp_millis();
        let key = Self::heartbeat_key(user_id);
        let mut conn = self.pool.get().await?;

        // SET .. GET needs Redis >= 6.2
        let previous: Option<String> = redis::cmd("SET")
            .arg(&key)
            .arg(now_ms)
            .arg("EX")
            .arg(self.horizon_secs)
            .arg("GET")
            .query_async(&mut conn)
            .await?;

        conn.zadd::<_, _, _, ()>(ONLINE_INDEX_KEY, user_id.to_string(), now_ms)
            .await?;

        let came_online = previous.is_none();
        if came_online {
            tracing::debug!(user_id = %user_id, "Heartbeat opened presence");
        }

        Ok(came_online)
    }

    /// Whether a user is currently online
    pub async fn is_online(&self, user_id: UserId) -> RedisResult<bool> {
        self.pool.exists(&Self::heartbeat_key(user_id)).await
    }

    /// Online flags for a batch of users, in input order
    pub async fn batch_online(&self, user_ids: &[UserId]) -> RedisResult<Vec<bool>> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }

        let keys: Vec<String> = user_ids.iter().map(|id| Self::heartbeat_key(*id)).collect();
        let mut conn = self.pool.get().await?;
        let values: Vec<Option<String>> = conn.mget(&keys).await?;

        Ok(values.iter().map(Option::is_some).collect())
    }

    /// Index members whose last heartbeat is older than the horizon
    ///
    /// These are candidates only: each one must still be claimed through
    /// [`claim_offline`](Self::claim_offline) before an offline event
    /// may be emitted.
    pub async fn expired_candidates(&self, limit: isize) -> RedisResult<Vec<UserId>> {
        let now_ms = Utc::now().timestamp_millis();
        let cutoff = now_ms - i64::try_from(self.horizon_secs * 1000).unwrap_or(i64::MAX);

        let mut conn = self.pool.get().await?;
        let members: Vec<String> = conn
            .zrangebyscore_limit(ONLINE_INDEX_KEY, "-inf", cutoff, 0, limit)
            .await?;

        Ok(members
            .iter()
            .filter_map(|member| UserId::parse(member).ok())
            .collect())
    }

    /// Try to claim the offline transition for one user
    ///
    /// Returns `true` for exactly one caller per lapse. Returns `false`
    /// when another sweeper already claimed the user, or when a fresh
    /// heartbeat raced the sweep - in that case the index entry is put
    /// back so the user stays visible to later sweeps.
    pub async fn claim_offline(&self, user_id: UserId) -> RedisResult<bool> {
        let mut conn = self.pool.get().await?;

        let removed: i64 = conn
            .zrem(ONLINE_INDEX_KEY, user_id.to_string())
            .await?;
        if removed == 0 {
            return Ok(false);
        }

        // A heartbeat may have landed between the index scan and the
        // removal. If the heartbeat key is alive the user is online:
        // restore the index entry and concede the claim.
        let alive: bool = conn.exists(Self::heartbeat_key(user_id)).await?;
        if alive {
            let now_ms = Utc::now().timestamp_millis();
            conn.zadd::<_, _, _, ()>(ONLINE_INDEX_KEY, user_id.to_string(), now_ms)
                .await?;
            return Ok(false);
        }

        tracing::debug!(user_id = %user_id, "Claimed offline transition");
        Ok(true)
    }
}
