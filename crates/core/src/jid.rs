//! JID (WhatsApp address) parsing and phone normalization.
//!
//! Gateway payloads address chats and contacts by JID, e.g.
//! `5511999998888@s.whatsapp.net` for individuals and
//! `120363041234567890@g.us` for groups. Reconciliation keys contacts
//! by the normalized phone part, so every path that touches a JID must
//! go through these helpers.

/// JID suffix for group chats.
pub const GROUP_SUFFIX: &str = "@g.us";

/// Sentinel JID for the status/broadcast pseudo-chat. Never synced.
pub const BROADCAST_JID: &str = "status@broadcast";

/// True if the JID refers to a group chat.
pub fn is_group(jid: &str) -> bool {
    jid.ends_with(GROUP_SUFFIX)
}

/// True if the JID is the broadcast/system pseudo-chat.
pub fn is_broadcast(jid: &str) -> bool {
    jid == BROADCAST_JID || jid.ends_with("@broadcast")
}

/// Extract the normalized phone/address part of a JID.
///
/// Strips the server suffix and any device qualifier (`:12`) so the
/// same contact observed via sync and via webhook produces the same
/// key. Group JIDs keep their full numeric id. Returns `None` for
/// empty or broadcast addresses — those entries are not reconcilable.
pub fn normalize_phone(jid: &str) -> Option<String> {
    if jid.is_empty() || is_broadcast(jid) {
        return None;
    }
    let local = jid.split('@').next().unwrap_or(jid);
    let local = local.split(':').next().unwrap_or(local);
    let digits: String = local.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    Some(digits)
}
