//! Sliding-window rate limiting over a shared counter store.
//!
//! Two keys exist per instance: the interactive sync limit (short
//! window, a few attempts) and the automatic post-connect limit
//! (effectively once per window, which is what collapses duplicate
//! reconciliations when several connection events fire in a burst).
//!
//! When the counter store is unreachable the limiter fails OPEN: sync
//! availability is worth more than strict enforcement, since a missed
//! limit only wastes gateway calls.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::Cache;

/// Counter backend for [`RateLimiter`].
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Increment the counter at `key`, creating it with the given TTL
    /// on first increment, and return the post-increment count.
    async fn incr_with_expiry(&self, key: &str, ttl: Duration) -> anyhow::Result<i64>;
}

#[async_trait]
impl CounterStore for Cache {
    async fn incr_with_expiry(&self, key: &str, ttl: Duration) -> anyhow::Result<i64> {
        Ok(Cache::incr_with_expiry(self, key, ttl.as_secs()).await?)
    }
}

/// Process-local counter for single-replica deployments and tests.
///
/// Expiry is evaluated lazily on the next increment, which matches the
/// Redis semantics closely enough for window-sized TTLs.
#[derive(Default)]
pub struct MemoryCounter {
    entries: Mutex<HashMap<String, (i64, Instant)>>,
}

#[async_trait]
impl CounterStore for MemoryCounter {
    async fn incr_with_expiry(&self, key: &str, ttl: Duration) -> anyhow::Result<i64> {
        let mut entries = self.entries.lock().expect("counter lock poisoned");
        let now = Instant::now();
        let entry = entries
            .entry(key.to_string())
            .and_modify(|(count, expires_at)| {
                if now >= *expires_at {
                    *count = 0;
                    *expires_at = now + ttl;
                }
                *count += 1;
            })
            .or_insert((1, now + ttl));
        Ok(entry.0)
    }
}

/// Shared sliding-window rate limiter.
#[derive(Clone)]
pub struct RateLimiter {
    counter: Arc<dyn CounterStore>,
}

impl RateLimiter {
    pub fn new(counter: Arc<dyn CounterStore>) -> Self {
        Self { counter }
    }

    /// Count one attempt against `key` within a window of
    /// `window` seconds; returns whether the attempt is allowed
    /// (`count <= limit`). Store failures allow the attempt.
    pub async fn try_acquire(&self, key: &str, limit: i64, window: Duration) -> bool {
        match self.counter.incr_with_expiry(key, window).await {
            Ok(count) => count <= limit,
            Err(err) => {
                tracing::warn!(key, error = %err, "Rate-limit store unreachable, failing open");
                true
            }
        }
    }
}

/// Window configuration for the two sync rate-limit keys.
#[derive(Debug, Clone)]
pub struct SyncLimits {
    /// Interactive (user-triggered) sync: attempts per window.
    pub manual_limit: i64,
    pub manual_window: Duration,
    /// Automatic (post-connect) sync: effectively once per window.
    pub auto_limit: i64,
    pub auto_window: Duration,
}

impl Default for SyncLimits {
    fn default() -> Self {
        Self {
            manual_limit: 5,
            manual_window: Duration::from_secs(60),
            auto_limit: 1,
            auto_window: Duration::from_secs(30),
        }
    }
}
