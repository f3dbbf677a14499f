//! Sync progress envelope published on the instance channel and stored
//! as the transient snapshot.
//!
//! Progress is scaled so the visible percentage is monotonic: 0 at
//! start, batch progress inside a reserved mid-range, 100 only on the
//! completion message. The first and last few percent are bookkeeping
//! headroom so progress never appears to jump backward.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use zapgate_core::types::DbId;

/// What triggered the reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncType {
    Manual,
    Auto,
}

/// `SYNC_START` payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStart {
    pub instance_id: DbId,
    #[serde(rename = "type")]
    pub sync_type: SyncType,
    /// Always `"starting"`.
    pub status: String,
    pub step: String,
    /// Always `0`.
    pub progress: u8,
}

impl SyncStart {
    pub fn new(instance_id: DbId, sync_type: SyncType) -> Self {
        Self {
            instance_id,
            sync_type,
            status: "starting".to_string(),
            step: "fetching chats".to_string(),
            progress: 0,
        }
    }
}

/// `SYNC_PROGRESS` payload, emitted after each batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncProgress {
    pub instance_id: DbId,
    #[serde(rename = "type")]
    pub sync_type: SyncType,
    pub status: String,
    pub step: String,
    pub progress: u8,
    pub contacts_processed: usize,
    pub chats_processed: usize,
    pub total_contacts: usize,
    pub total_chats: usize,
    pub timestamp: DateTime<Utc>,
}

/// `SYNC_COMPLETE` payload; `status` is `"completed"` or `"error"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncComplete {
    pub instance_id: DbId,
    #[serde(rename = "type")]
    pub sync_type: SyncType,
    pub status: String,
    pub step: String,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl SyncComplete {
    pub fn completed(instance_id: DbId, sync_type: SyncType) -> Self {
        Self {
            instance_id,
            sync_type,
            status: "completed".to_string(),
            step: "done".to_string(),
            progress: 100,
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn failed(instance_id: DbId, sync_type: SyncType, error: String) -> Self {
        Self {
            instance_id,
            sync_type,
            status: "error".to_string(),
            step: "aborted".to_string(),
            progress: 100,
            error: Some(error),
            timestamp: Utc::now(),
        }
    }
}

/// Progress percentage reserved for start/finalize bookkeeping.
pub const PROGRESS_FLOOR: u8 = 5;
pub const PROGRESS_CEILING: u8 = 95;

/// Scale `processed / total` into the reserved mid-range
/// `[PROGRESS_FLOOR, PROGRESS_CEILING]`.
///
/// Zero-total runs report the ceiling straight away; only the
/// completion message ever reports 100.
pub fn scale_progress(processed: usize, total: usize) -> u8 {
    if total == 0 {
        return PROGRESS_CEILING;
    }
    let span = (PROGRESS_CEILING - PROGRESS_FLOOR) as usize;
    let scaled = PROGRESS_FLOOR as usize + (processed.min(total) * span) / total;
    scaled as u8
}
