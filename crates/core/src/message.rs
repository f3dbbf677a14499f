//! Typed message content extraction and delivery-status mapping.
//!
//! Gateway payloads carry one message as a JSON object with a `key`
//! (`remoteJid`, `fromMe`, `id`), an optional `message` body whose
//! first recognized sub-object determines the kind, and an ack status
//! that arrives either numeric or symbolic depending on the event.

use serde::{Deserialize, Serialize};

/// Domain message type, stored as lowercase text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Image,
    Video,
    Audio,
    Document,
    Sticker,
    Location,
    System,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Text => "text",
            MessageKind::Image => "image",
            MessageKind::Video => "video",
            MessageKind::Audio => "audio",
            MessageKind::Document => "document",
            MessageKind::Sticker => "sticker",
            MessageKind::Location => "location",
            MessageKind::System => "system",
        }
    }

    /// Chat-list summary used when the message has no plain text body.
    pub fn placeholder(&self) -> &'static str {
        match self {
            MessageKind::Text => "",
            MessageKind::Image => "[image]",
            MessageKind::Video => "[video]",
            MessageKind::Audio => "[audio]",
            MessageKind::Document => "[document]",
            MessageKind::Sticker => "[sticker]",
            MessageKind::Location => "[location]",
            MessageKind::System => "[system]",
        }
    }
}

/// Delivery status of a message, stored as lowercase text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Pending,
    Sent,
    Delivered,
    Read,
    Played,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "pending",
            DeliveryStatus::Sent => "sent",
            DeliveryStatus::Delivered => "delivered",
            DeliveryStatus::Read => "read",
            DeliveryStatus::Played => "played",
        }
    }

    /// Map a gateway ack to the domain status.
    ///
    /// `MESSAGES_UPDATE` events carry either a numeric ack (0..=4) or a
    /// symbolic name; both forms are accepted. Unknown values are `None`
    /// so the caller can skip the update instead of guessing.
    pub fn from_ack(ack: &serde_json::Value) -> Option<Self> {
        if let Some(n) = ack.as_i64() {
            return match n {
                0 | 1 => Some(DeliveryStatus::Pending),
                2 => Some(DeliveryStatus::Sent),
                3 => Some(DeliveryStatus::Delivered),
                4 => Some(DeliveryStatus::Read),
                5 => Some(DeliveryStatus::Played),
                _ => None,
            };
        }
        match ack.as_str()?.to_ascii_uppercase().as_str() {
            "PENDING" | "ERROR" => Some(DeliveryStatus::Pending),
            "SERVER_ACK" | "SENT" => Some(DeliveryStatus::Sent),
            "DELIVERY_ACK" | "DELIVERED" => Some(DeliveryStatus::Delivered),
            "READ" => Some(DeliveryStatus::Read),
            "PLAYED" => Some(DeliveryStatus::Played),
            _ => None,
        }
    }
}

/// Content extracted from one gateway message body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageContent {
    pub kind: MessageKind,
    /// Plain text body, or a caption for media kinds.
    pub text: Option<String>,
    /// Media URL when the gateway exposes one.
    pub media_url: Option<String>,
}

impl MessageContent {
    /// Chat-list summary: the text body if present, else the kind
    /// placeholder.
    pub fn summary(&self) -> String {
        match &self.text {
            Some(t) if !t.is_empty() => t.clone(),
            _ => self.kind.placeholder().to_string(),
        }
    }
}

/// Extract typed content from the `message` sub-object of a gateway
/// message payload.
///
/// The first recognized media key wins; a missing or unrecognized body
/// is a system message (protocol notifications, reactions to deleted
/// content, etc.).
pub fn extract_content(message: Option<&serde_json::Value>) -> MessageContent {
    let Some(message) = message else {
        return MessageContent {
            kind: MessageKind::System,
            text: None,
            media_url: None,
        };
    };

    if let Some(text) = message.get("conversation").and_then(|v| v.as_str()) {
        return MessageContent {
            kind: MessageKind::Text,
            text: Some(text.to_string()),
            media_url: None,
        };
    }
    if let Some(ext) = message.get("extendedTextMessage") {
        let text = ext.get("text").and_then(|v| v.as_str()).map(String::from);
        return MessageContent {
            kind: MessageKind::Text,
            text,
            media_url: None,
        };
    }

    let media_kinds = [
        ("imageMessage", MessageKind::Image),
        ("videoMessage", MessageKind::Video),
        ("audioMessage", MessageKind::Audio),
        ("documentMessage", MessageKind::Document),
        ("stickerMessage", MessageKind::Sticker),
    ];
    for (key, kind) in media_kinds {
        if let Some(media) = message.get(key) {
            let text = media
                .get("caption")
                .and_then(|v| v.as_str())
                .map(String::from);
            let media_url = media.get("url").and_then(|v| v.as_str()).map(String::from);
            return MessageContent {
                kind,
                text,
                media_url,
            };
        }
    }

    if let Some(loc) = message.get("locationMessage") {
        let text = loc.get("name").and_then(|v| v.as_str()).map(String::from);
        return MessageContent {
            kind: MessageKind::Location,
            text,
            media_url: None,
        };
    }

    MessageContent {
        kind: MessageKind::System,
        text: None,
        media_url: None,
    }
}
