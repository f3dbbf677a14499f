//! Connection state machine for gateway-backed instances.
//!
//! The gateway reports free-form transport states (`open`, `qr`,
//! `close`, ...). [`map_connection_state`] reduces them to the fixed
//! set of domain statuses stored on an instance row. The mapping is a
//! pure function: side effects on entry to [`ConnectionStatus::Connected`]
//! (phone-number resolution, persistence) belong to the caller in the
//! sync crate.

use serde::{Deserialize, Serialize};

/// Domain connection status of an instance.
///
/// Stored as lowercase text in the `instances.status` column. The
/// `orphaned` condition is not a separate status: it is `Error` plus
/// the `orphaned` flag in the instance settings blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Disconnected,
    Error,
}

impl ConnectionStatus {
    /// Text encoding used in the database and in event payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Error => "error",
        }
    }

    /// Parse the database text encoding. Unknown values map to
    /// `Disconnected` rather than failing; old rows must stay readable.
    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "connecting" => ConnectionStatus::Connecting,
            "connected" => ConnectionStatus::Connected,
            "error" => ConnectionStatus::Error,
            _ => ConnectionStatus::Disconnected,
        }
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transport-level state as reported by the gateway.
///
/// Only used transiently during mapping; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderState {
    Open,
    Connecting,
    Qr,
    Opening,
    Pairing,
    Close,
    Unknown,
}

impl ProviderState {
    /// Parse a raw gateway state string, case-insensitively.
    ///
    /// Anything unrecognized becomes [`ProviderState::Unknown`], which
    /// maps to `Disconnected` downstream.
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "open" => ProviderState::Open,
            "connecting" => ProviderState::Connecting,
            "qr" => ProviderState::Qr,
            "opening" => ProviderState::Opening,
            "pairing" => ProviderState::Pairing,
            "close" | "closed" => ProviderState::Close,
            _ => ProviderState::Unknown,
        }
    }
}

/// Map a gateway-reported state to the domain status.
///
/// `has_pairing_artifact` is true while a QR code or numeric pairing
/// code issued during device linking is still outstanding. An `open`
/// transport with an outstanding pairing artifact is still
/// `Connecting`: the artifact is authoritative, even if the phone
/// number has already been resolved.
///
/// A gateway "not found" lookup is handled by the caller (orphan
/// recovery) and never reaches this function.
pub fn map_connection_state(
    state: Option<ProviderState>,
    has_pairing_artifact: bool,
) -> ConnectionStatus {
    match state {
        Some(ProviderState::Open) if has_pairing_artifact => ConnectionStatus::Connecting,
        Some(ProviderState::Open) => ConnectionStatus::Connected,
        Some(ProviderState::Connecting)
        | Some(ProviderState::Qr)
        | Some(ProviderState::Opening)
        | Some(ProviderState::Pairing) => ConnectionStatus::Connecting,
        Some(ProviderState::Close) | Some(ProviderState::Unknown) | None => {
            ConnectionStatus::Disconnected
        }
    }
}
