//! The reconciliation and webhook engine.
//!
//! This crate owns everything with real concurrency and idempotency
//! concerns: the full-sync orchestrator, the inbound webhook router,
//! connection-state application, automatic post-connect sync
//! scheduling, and orphan detection/recreation.
//!
//! The engine talks to its collaborators through capability traits —
//! [`store::SyncStore`] for persistence, [`gateway::Gateway`] for the
//! WhatsApp gateway, and `zapgate_events::Broadcaster` for real-time
//! fan-out — so the whole engine runs against in-memory doubles in
//! tests. Production wires in [`store::PgStore`],
//! `zapgate_provider::ProviderClient` and `zapgate_events::EventBus`.

pub mod autosync;
pub mod engine;
pub mod gateway;
pub mod lifecycle;
pub mod orchestrator;
pub mod orphan;
pub mod store;
pub mod webhook;

pub use engine::{EngineConfig, SyncEngine};
pub use lifecycle::PairingArtifact;
pub use orchestrator::{SyncFailure, SyncReport};
pub use orphan::FleetScanReport;
