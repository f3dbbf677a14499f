//! Real-time event infrastructure.
//!
//! - [`EventBus`] — per-instance publish/subscribe hub backed by
//!   `tokio::sync::broadcast`, one channel per instance.
//! - [`Broadcaster`] — the capability the sync engine and webhook
//!   router are handed instead of a process-wide singleton, so tests
//!   can observe published events without a live transport.
//! - [`progress`] — the sync progress envelope
//!   (`SYNC_START` / `SYNC_PROGRESS` / `SYNC_COMPLETE`).

pub mod bus;
pub mod names;
pub mod progress;

pub use bus::{Broadcaster, EventBus, InstanceEvent};
pub use progress::{SyncComplete, SyncProgress, SyncStart, SyncType};
