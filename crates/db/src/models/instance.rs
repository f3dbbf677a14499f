//! Instance entity models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use zapgate_core::types::{DbId, Timestamp};

/// A row from the `instances` table.
///
/// `settings` is a free-form blob; the orphan flag, orphan timestamp /
/// reason and the outstanding pairing code live inside it so schema
/// churn is not needed for gateway-side bookkeeping.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Instance {
    pub id: DbId,
    pub name: String,
    pub provider_instance_id: String,
    pub status: String,
    pub phone_number: Option<String>,
    pub last_seen_at: Option<Timestamp>,
    pub settings: serde_json::Value,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Instance {
    /// True when the instance has been flagged as orphaned (its
    /// gateway-side session no longer exists).
    pub fn is_orphaned(&self) -> bool {
        self.settings
            .get("orphaned")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    /// Outstanding pairing artifact (QR code or numeric pairing code),
    /// if device linking has not completed yet.
    pub fn pairing_code(&self) -> Option<&str> {
        self.settings.get("pairing_code").and_then(|v| v.as_str())
    }
}

/// DTO for creating an instance.
#[derive(Debug, Deserialize)]
pub struct CreateInstance {
    pub name: String,
}
