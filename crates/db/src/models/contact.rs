//! Contact entity models.

use serde::Serialize;
use sqlx::FromRow;
use zapgate_core::types::{DbId, Timestamp};

/// A row from the `contacts` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Contact {
    pub id: DbId,
    pub instance_id: DbId,
    pub phone: String,
    pub name: Option<String>,
    pub push_name: Option<String>,
    pub avatar_url: Option<String>,
    pub is_group: bool,
    pub group_metadata: Option<serde_json::Value>,
    pub is_blocked: bool,
    pub last_seen_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Mutable contact fields applied by the idempotent upsert
/// (last-write-wins; `None` leaves the stored value untouched).
#[derive(Debug, Clone, Default)]
pub struct ContactUpsert {
    pub name: Option<String>,
    pub push_name: Option<String>,
    pub avatar_url: Option<String>,
    pub is_group: Option<bool>,
    pub group_metadata: Option<serde_json::Value>,
}
