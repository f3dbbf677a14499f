//! Message entity models.

use serde::Serialize;
use sqlx::FromRow;
use zapgate_core::types::{DbId, Timestamp};

/// A row from the `messages` table. Messages are immutable apart from
/// `delivery_status` and the soft-delete flag.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Message {
    pub id: DbId,
    pub instance_id: DbId,
    pub chat_id: DbId,
    pub contact_id: Option<DbId>,
    pub message_id: String,
    pub from_me: bool,
    pub message_type: String,
    pub content: Option<String>,
    pub media_url: Option<String>,
    pub message_timestamp: Option<Timestamp>,
    pub delivery_status: String,
    pub is_deleted: bool,
    pub created_at: Timestamp,
}

/// Fields for inserting a new message.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub instance_id: DbId,
    pub chat_id: DbId,
    pub contact_id: Option<DbId>,
    pub message_id: String,
    pub from_me: bool,
    pub message_type: String,
    pub content: Option<String>,
    pub media_url: Option<String>,
    pub message_timestamp: Option<Timestamp>,
    pub delivery_status: String,
}
