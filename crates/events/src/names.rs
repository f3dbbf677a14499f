//! Well-known event name constants for the per-instance channel.
//!
//! These must match what WebSocket subscribers dispatch on; changing a
//! name breaks deployed clients.

pub const CONNECTION_UPDATE: &str = "connection_update";
pub const QRCODE_UPDATED: &str = "qrcode_updated";
pub const NEW_MESSAGE: &str = "new_message";

/// Notification variant of [`NEW_MESSAGE`], emitted only for inbound
/// messages (drives unread badges and OS notifications).
pub const MESSAGE_RECEIVED: &str = "message_received";

pub const MESSAGE_STATUS_UPDATE: &str = "message_status_update";
pub const CONTACTS_UPDATE: &str = "contacts_update";
pub const CHATS_UPDATE: &str = "chats_update";
pub const PRESENCE_UPDATE: &str = "presence_update";

pub const SYNC_START: &str = "sync_start";
pub const SYNC_PROGRESS: &str = "sync_progress";
pub const SYNC_COMPLETE: &str = "sync_complete";
