//! Shared counter/cache store backed by Redis.
//!
//! This is the only cross-replica coordination point in the system:
//! rate-limit counters, transient sync-progress snapshots, and the
//! optional read-through cache of gateway responses all live here.
//! Every consumer is written to degrade when Redis is unreachable —
//! rate limiting fails open and snapshots become best-effort — so the
//! store is never on the availability-critical path.

pub mod keys;
pub mod progress;
pub mod rate_limit;
pub mod response;

use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};

/// Async Redis handle, cheap to clone (`ConnectionManager` multiplexes
/// one connection and reconnects internally).
#[derive(Clone)]
pub struct Cache {
    conn: ConnectionManager,
}

impl Cache {
    /// Connect to Redis at the given URL.
    pub async fn connect(redis_url: &str) -> Result<Self, redis::RedisError> {
        let client = Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }

    /// Increment an integer counter; set the key's expiry when this
    /// increment created it (first hit in the window).
    pub async fn incr_with_expiry(
        &self,
        key: &str,
        ttl_secs: u64,
    ) -> Result<i64, redis::RedisError> {
        let mut conn = self.conn.clone();
        let count: i64 = conn.incr(key, 1).await?;
        if count == 1 {
            conn.expire::<_, ()>(key, ttl_secs as i64).await?;
        }
        Ok(count)
    }

    /// Store a JSON value under `key` with a TTL.
    pub async fn set_json_ex(
        &self,
        key: &str,
        value: &serde_json::Value,
        ttl_secs: u64,
    ) -> Result<(), redis::RedisError> {
        let mut conn = self.conn.clone();
        let serialized = value.to_string();
        conn.set_ex::<_, _, ()>(key, serialized, ttl_secs).await
    }

    /// Fetch a JSON value. Unparseable payloads are treated as absent.
    pub async fn get_json(&self, key: &str) -> Result<Option<serde_json::Value>, redis::RedisError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(key).await?;
        Ok(raw.and_then(|s| serde_json::from_str(&s).ok()))
    }

    /// Delete a key.
    pub async fn delete(&self, key: &str) -> Result<(), redis::RedisError> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key).await
    }
}
