//! Short-lived read-through cache for gateway responses.
//!
//! State-refresh polling from many clients would otherwise hit the
//! gateway once per request. One JSON value per (kind, instance) under
//! `evolution:{kind}:{id}`; the TTL is short because connection state
//! goes stale in seconds. Like the progress store, a replica without
//! Redis runs disabled and every lookup is a miss.

use crate::{keys, Cache};

/// Response TTL. Stale connection state is worse than an extra gateway
/// round trip, so this stays in single-digit seconds.
const RESPONSE_TTL_SECS: u64 = 10;

/// Best-effort cache for per-instance gateway responses.
#[derive(Clone)]
pub struct ResponseCache {
    cache: Option<Cache>,
}

impl ResponseCache {
    pub fn new(cache: Cache) -> Self {
        Self { cache: Some(cache) }
    }

    /// A cache where every read misses and every write is dropped.
    pub fn disabled() -> Self {
        Self { cache: None }
    }

    /// Read a cached response. Backend errors are logged and count as
    /// a miss.
    pub async fn get(&self, kind: &str, instance_id: i64) -> Option<serde_json::Value> {
        let cache = self.cache.as_ref()?;
        let key = keys::provider_response(kind, instance_id);
        match cache.get_json(&key).await {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(instance_id, kind, error = %err, "Failed to read cached gateway response");
                None
            }
        }
    }

    /// Store a response. Failures are logged and swallowed.
    pub async fn put(&self, kind: &str, instance_id: i64, value: &serde_json::Value) {
        let Some(cache) = &self.cache else { return };
        let key = keys::provider_response(kind, instance_id);
        if let Err(err) = cache.set_json_ex(&key, value, RESPONSE_TTL_SECS).await {
            tracing::warn!(instance_id, kind, error = %err, "Failed to cache gateway response");
        }
    }

    /// Drop a cached response, forcing the next read through to the
    /// gateway.
    pub async fn invalidate(&self, kind: &str, instance_id: i64) {
        let Some(cache) = &self.cache else { return };
        let key = keys::provider_response(kind, instance_id);
        if let Err(err) = cache.delete(&key).await {
            tracing::warn!(instance_id, kind, error = %err, "Failed to invalidate cached gateway response");
        }
    }
}
