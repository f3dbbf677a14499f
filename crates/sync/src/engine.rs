//! Engine wiring: collaborators, tunables, and the connection-state
//! application shared by webhook handling and on-demand refresh.

use std::sync::Arc;
use std::time::Duration;

use zapgate_cache::progress::ProgressStore;
use zapgate_cache::rate_limit::{RateLimiter, SyncLimits};
use zapgate_cache::response::ResponseCache;
use zapgate_core::connection::{map_connection_state, ConnectionStatus, ProviderState};
use zapgate_core::error::CoreError;
use zapgate_core::jid;
use zapgate_core::types::DbId;
use zapgate_db::models::instance::Instance;
use zapgate_events::Broadcaster;

use crate::gateway::Gateway;
use crate::store::SyncStore;

/// Engine tunables. Defaults are production values; tests shrink the
/// delays.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Entries per reconciliation batch. Bounds per-round-trip latency
    /// against the gateway and the store; does not affect correctness.
    pub batch_size: usize,
    /// Pause between batches so one reconciliation does not monopolize
    /// the store connection.
    pub batch_pause: Duration,
    /// Delay between a connection becoming `connected` and the
    /// automatic reconciliation it schedules, letting the gateway
    /// session settle.
    pub autosync_settle_delay: Duration,
    /// Rate-limit windows for the manual and automatic sync keys.
    pub limits: SyncLimits,
    /// Public base URL of this backend, used to build the webhook
    /// target registered with the gateway (`{base}/webhook/{name}`).
    pub webhook_base_url: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch_size: 25,
            batch_pause: Duration::from_millis(50),
            autosync_settle_delay: Duration::from_secs(2),
            limits: SyncLimits::default(),
            webhook_base_url: "http://localhost:3000".to_string(),
        }
    }
}

/// The reconciliation and webhook engine.
///
/// Cheap to clone; collaborators are shared behind `Arc`. Long-lived
/// operations spawned by the engine (automatic syncs) clone it into
/// the task.
#[derive(Clone)]
pub struct SyncEngine {
    pub(crate) store: Arc<dyn SyncStore>,
    pub(crate) gateway: Arc<dyn Gateway>,
    pub(crate) broadcaster: Arc<dyn Broadcaster>,
    pub(crate) limiter: RateLimiter,
    pub(crate) progress: ProgressStore,
    pub(crate) responses: ResponseCache,
    pub(crate) config: Arc<EngineConfig>,
}

impl SyncEngine {
    pub fn new(
        store: Arc<dyn SyncStore>,
        gateway: Arc<dyn Gateway>,
        broadcaster: Arc<dyn Broadcaster>,
        limiter: RateLimiter,
        progress: ProgressStore,
        responses: ResponseCache,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            gateway,
            broadcaster,
            limiter,
            progress,
            responses,
            config: Arc::new(config),
        }
    }

    /// Build the webhook URL the gateway should deliver an instance's
    /// events to.
    pub(crate) fn webhook_url(&self, provider_instance_id: &str) -> String {
        format!(
            "{}/webhook/{}",
            self.config.webhook_base_url.trim_end_matches('/'),
            provider_instance_id
        )
    }

    /// Apply a raw gateway transport state to an instance.
    ///
    /// An `open` transport means the device finished pairing, so any
    /// outstanding pairing artifact is cleared first; the pure mapper
    /// then runs against the post-clear state. The status is persisted
    /// only when it differs from the stored one, and entry to
    /// `connected` resolves the phone number from the gateway when it
    /// is still unknown. Returns `(previous, next)`.
    pub(crate) async fn apply_raw_state(
        &self,
        instance: &Instance,
        raw_state: Option<&str>,
    ) -> Result<(ConnectionStatus, ConnectionStatus), CoreError> {
        let previous = ConnectionStatus::from_str_lossy(&instance.status);
        let raw = raw_state.map(ProviderState::parse);

        let mut has_artifact = instance.pairing_code().is_some();
        if has_artifact && raw == Some(ProviderState::Open) {
            // The artifact is stale once the transport is open; left in
            // place it would pin the mapping on connecting forever.
            self.store
                .merge_instance_settings(
                    instance.id,
                    &serde_json::json!({ "pairing_code": null }),
                )
                .await
                .map_err(internal)?;
            has_artifact = false;
        }

        let next = map_connection_state(raw, has_artifact);

        if next != previous {
            self.store
                .update_instance_status(instance.id, next.as_str())
                .await
                .map_err(internal)?;
        }

        if next == ConnectionStatus::Connected && instance.phone_number.is_none() {
            self.resolve_phone_number(instance).await;
        }

        Ok((previous, next))
    }

    /// Best-effort phone resolution from the gateway's instance info.
    /// Failures are logged; a missing phone number is not an error.
    async fn resolve_phone_number(&self, instance: &Instance) {
        let info = match self
            .gateway
            .instance_info(&instance.provider_instance_id)
            .await
        {
            Ok(info) => info,
            Err(err) => {
                tracing::warn!(
                    instance_id = instance.id,
                    error = %err,
                    "Failed to fetch instance info for phone resolution",
                );
                return;
            }
        };

        let Some(owner) = info.and_then(|i| i.owner) else {
            return;
        };
        let Some(phone) = jid::normalize_phone(&owner) else {
            return;
        };

        if let Err(err) = self.store.update_instance_phone(instance.id, &phone).await {
            tracing::warn!(
                instance_id = instance.id,
                error = %err,
                "Failed to persist resolved phone number",
            );
        } else {
            tracing::info!(instance_id = instance.id, "Resolved phone number on connect");
        }
    }

    /// Load an instance or fail with `NotFound`.
    pub(crate) async fn require_instance(&self, id: DbId) -> Result<Instance, CoreError> {
        self.store
            .find_instance(id)
            .await
            .map_err(internal)?
            .ok_or(CoreError::NotFound {
                entity: "Instance",
                id,
            })
    }
}

/// Map a store-level failure into the internal error variant.
pub(crate) fn internal(err: anyhow::Error) -> CoreError {
    CoreError::Internal(err.to_string())
}
