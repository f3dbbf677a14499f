//! Transient sync-progress snapshot store.
//!
//! One JSON snapshot per instance under `sync:progress:{id}` with a
//! short TTL; the next snapshot supersedes it and completion or error
//! clears it. Replicas without a Redis connection run with a disabled
//! store: writes become no-ops and subscribers on other replicas simply
//! do not see cross-process progress, which is an accepted limitation.

use crate::{keys, Cache};

/// Snapshot TTL. Long enough to survive a slow reconciliation step,
/// short enough that a crashed run does not leave a stale snapshot.
const SNAPSHOT_TTL_SECS: u64 = 300;

/// Best-effort store for per-instance progress snapshots.
#[derive(Clone)]
pub struct ProgressStore {
    cache: Option<Cache>,
}

impl ProgressStore {
    pub fn new(cache: Cache) -> Self {
        Self { cache: Some(cache) }
    }

    /// A store that drops every write. Used when Redis is not
    /// configured and in engine tests.
    pub fn disabled() -> Self {
        Self { cache: None }
    }

    /// Write the current snapshot for an instance. Failures are logged
    /// and swallowed; progress storage is never fatal to a sync.
    pub async fn put(&self, instance_id: i64, snapshot: &serde_json::Value) {
        let Some(cache) = &self.cache else { return };
        let key = keys::sync_progress(instance_id);
        if let Err(err) = cache.set_json_ex(&key, snapshot, SNAPSHOT_TTL_SECS).await {
            tracing::warn!(instance_id, error = %err, "Failed to store progress snapshot");
        }
    }

    /// Read the current snapshot, if any.
    pub async fn get(&self, instance_id: i64) -> Option<serde_json::Value> {
        let cache = self.cache.as_ref()?;
        let key = keys::sync_progress(instance_id);
        match cache.get_json(&key).await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                tracing::warn!(instance_id, error = %err, "Failed to read progress snapshot");
                None
            }
        }
    }

    /// Clear the snapshot on completion or error.
    pub async fn clear(&self, instance_id: i64) {
        let Some(cache) = &self.cache else { return };
        let key = keys::sync_progress(instance_id);
        if let Err(err) = cache.delete(&key).await {
            tracing::warn!(instance_id, error = %err, "Failed to clear progress snapshot");
        }
    }
}
