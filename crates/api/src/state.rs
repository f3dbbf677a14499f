use std::sync::Arc;

use zapgate_events::EventBus;
use zapgate_sync::SyncEngine;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via
/// `State<AppState>`.
///
/// Cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: zapgate_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// The reconciliation and webhook engine.
    pub engine: SyncEngine,
    /// Per-instance event hub for WebSocket subscribers.
    pub event_bus: Arc<EventBus>,
}
