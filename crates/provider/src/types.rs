//! Wire DTOs for the gateway REST API.

use serde::{Deserialize, Serialize};

/// Connection state as reported by
/// `GET /instance/connectionState/{name}`.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionState {
    /// Raw state string (`open`, `connecting`, `close`, ...). May be
    /// absent on some gateway versions.
    pub state: Option<String>,
}

/// One gateway-side instance from `GET /instance/fetchInstances`.
#[derive(Debug, Clone, Deserialize)]
pub struct InstanceInfo {
    #[serde(rename = "instanceName")]
    pub instance_name: String,
    /// Owner JID (`<phone>@s.whatsapp.net`) once the device is paired.
    pub owner: Option<String>,
    #[serde(rename = "profileName")]
    pub profile_name: Option<String>,
    pub state: Option<String>,
}

/// One chat entry from `GET /chat/findChats/{name}`.
///
/// The gateway's chat objects are loosely shaped; only the fields the
/// reconciliation pass needs are typed, the rest stays in `extra`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteChat {
    /// Chat JID (`<phone>@s.whatsapp.net`, `<id>@g.us`, or the
    /// `status@broadcast` sentinel).
    pub id: String,
    pub name: Option<String>,
    #[serde(rename = "pushName")]
    pub push_name: Option<String>,
    /// Most recent message object, when the gateway includes one.
    #[serde(rename = "lastMessage")]
    pub last_message: Option<serde_json::Value>,
    /// Unix seconds of the last conversation activity.
    #[serde(rename = "conversationTimestamp")]
    pub conversation_timestamp: Option<i64>,
    #[serde(flatten)]
    pub extra: serde_json::Value,
}

/// Result of `POST /instance/create`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedInstance {
    #[serde(rename = "instanceName")]
    pub instance_name: String,
    /// Pairing artifact issued immediately when `qrcode` was requested.
    pub qrcode: Option<serde_json::Value>,
}

/// Pairing artifact from `GET /instance/connect/{name}`.
#[derive(Debug, Clone, Deserialize)]
pub struct PairingInfo {
    /// Base64 QR code image, when issued.
    pub base64: Option<String>,
    /// Numeric pairing code, when issued.
    #[serde(rename = "pairingCode")]
    pub pairing_code: Option<String>,
}
