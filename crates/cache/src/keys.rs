//! Well-known cache key formats.
//!
//! Keys are shared across backend replicas; changing a format here is a
//! rolling-upgrade hazard.

/// Transient sync progress snapshot, ~300 s TTL.
pub fn sync_progress(instance_id: i64) -> String {
    format!("sync:progress:{instance_id}")
}

/// Manual (user-triggered) sync rate counter; TTL = window length.
pub fn rate_sync_manual(instance_id: i64) -> String {
    format!("rate:sync:{instance_id}")
}

/// Automatic (post-connect) sync rate counter; TTL = window length.
pub fn rate_sync_auto(instance_id: i64) -> String {
    format!("rate:sync:auto_{instance_id}")
}

/// Read-through cache of a gateway response, short TTL.
pub fn provider_response(kind: &str, instance_id: i64) -> String {
    format!("evolution:{kind}:{instance_id}")
}
