//! HTTP client for the Evolution-style WhatsApp gateway.
//!
//! The gateway owns the real protocol sessions; this crate wraps its
//! REST API (instance lifecycle, connection state, chat listing,
//! webhook registration) using [`reqwest`]. Wire DTOs live in
//! [`types`]; everything gateway-shaped stays behind this crate so the
//! sync engine never sees raw JSON endpoints.

pub mod client;
pub mod error;
pub mod types;

pub use client::ProviderClient;
pub use error::ProviderError;
