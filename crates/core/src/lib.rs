//! Pure domain logic for the zapgate WhatsApp gateway bridge.
//!
//! Everything in this crate is side-effect free: the connection state
//! machine, webhook event normalization, JID/phone handling, and
//! message content extraction all operate on plain values so they can
//! be tested without a database, cache, or gateway.

pub mod connection;
pub mod error;
pub mod jid;
pub mod message;
pub mod types;
pub mod webhook;
