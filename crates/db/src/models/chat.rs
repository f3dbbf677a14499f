//! Chat entity models.

use serde::Serialize;
use sqlx::FromRow;
use zapgate_core::types::{DbId, Timestamp};

/// A row from the `chats` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Chat {
    pub id: DbId,
    pub instance_id: DbId,
    pub contact_id: DbId,
    pub chat_id: String,
    pub last_message: Option<String>,
    pub last_message_type: Option<String>,
    pub last_message_sender: Option<String>,
    pub last_message_at: Option<Timestamp>,
    pub unread_count: i32,
    pub is_pinned: bool,
    pub is_archived: bool,
    pub is_muted: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Last-message snapshot applied to a chat row on new activity.
#[derive(Debug, Clone, Default)]
pub struct ChatSnapshot {
    pub last_message: Option<String>,
    pub last_message_type: Option<String>,
    pub last_message_sender: Option<String>,
    pub last_message_at: Option<Timestamp>,
}
