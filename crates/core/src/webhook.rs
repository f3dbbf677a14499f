//! Webhook event name normalization.
//!
//! The gateway delivers event names as free-form strings whose casing
//! and separators vary between versions (`MESSAGES_UPSERT`,
//! `messages.upsert`, `Messages-Upsert`). They are folded into a closed
//! enum at the ingress boundary; everything downstream dispatches on
//! the tag, never on the raw string.

use serde::Deserialize;

/// Canonical webhook event tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEvent {
    QrcodeUpdated,
    ConnectionUpdate,
    MessagesUpsert,
    MessagesUpdate,
    ContactsUpsert,
    ContactsUpdate,
    ChatsUpsert,
    ChatsUpdate,
    PresenceUpdate,
    ApplicationStartup,
    /// Anything the router has no handler for. Logged once at the
    /// boundary, then acknowledged.
    Unhandled(String),
}

impl WebhookEvent {
    /// Normalize a raw event name: case-fold, then fold `.`, `-` and
    /// spaces to `_`.
    pub fn normalize(raw: &str) -> Self {
        let folded: String = raw
            .trim()
            .to_ascii_lowercase()
            .chars()
            .map(|c| match c {
                '.' | '-' | ' ' => '_',
                c => c,
            })
            .collect();
        match folded.as_str() {
            "qrcode_updated" => WebhookEvent::QrcodeUpdated,
            "connection_update" => WebhookEvent::ConnectionUpdate,
            "messages_upsert" => WebhookEvent::MessagesUpsert,
            "messages_update" => WebhookEvent::MessagesUpdate,
            "contacts_upsert" => WebhookEvent::ContactsUpsert,
            "contacts_update" => WebhookEvent::ContactsUpdate,
            "chats_upsert" => WebhookEvent::ChatsUpsert,
            "chats_update" => WebhookEvent::ChatsUpdate,
            "presence_update" => WebhookEvent::PresenceUpdate,
            "application_startup" => WebhookEvent::ApplicationStartup,
            _ => WebhookEvent::Unhandled(raw.to_string()),
        }
    }
}

/// Inbound webhook envelope: `{ "event": ..., "data": ... }`.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEnvelope {
    pub event: String,
    #[serde(default)]
    pub data: serde_json::Value,
}
