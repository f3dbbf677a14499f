//! Automatic post-connect reconciliation.
//!
//! Scheduled when an instance transitions into `connected`. The auto
//! rate key is consumed at schedule time, not at run time: connection
//! events arrive in bursts (gateway reconnects, duplicate deliveries)
//! and consuming the key up front collapses the burst into one sync.

use zapgate_cache::keys;
use zapgate_core::connection::ConnectionStatus;
use zapgate_core::types::DbId;
use zapgate_events::progress::SyncType;

use crate::engine::SyncEngine;

impl SyncEngine {
    /// Schedule an automatic reconciliation for a freshly connected
    /// instance. Returns whether a sync was actually scheduled.
    pub async fn schedule_auto_sync(&self, instance_id: DbId) -> bool {
        let limits = &self.config.limits;
        let allowed = self
            .limiter
            .try_acquire(
                &keys::rate_sync_auto(instance_id),
                limits.auto_limit,
                limits.auto_window,
            )
            .await;
        if !allowed {
            tracing::debug!(
                instance_id,
                "Auto sync already scheduled within the window, skipped",
            );
            return false;
        }

        let engine = self.clone();
        tokio::spawn(async move {
            // Let the gateway session settle before pulling the full
            // chat list; right after pairing it often returns partial
            // data.
            tokio::time::sleep(engine.config.autosync_settle_delay).await;

            let instance = match engine.store.find_instance(instance_id).await {
                Ok(Some(instance)) => instance,
                Ok(None) => {
                    tracing::debug!(instance_id, "Instance deleted before auto sync ran");
                    return;
                }
                Err(err) => {
                    tracing::error!(instance_id, error = %err, "Auto sync instance load failed");
                    return;
                }
            };

            if instance.is_orphaned()
                || instance.status != ConnectionStatus::Connected.as_str()
            {
                tracing::debug!(
                    instance_id,
                    status = %instance.status,
                    "Instance no longer connected, auto sync skipped",
                );
                return;
            }

            if let Err(err) = engine.run_reconciliation(&instance, SyncType::Auto).await {
                tracing::error!(instance_id, error = %err, "Auto sync failed");
            }
        });

        tracing::info!(instance_id, "Auto sync scheduled");
        true
    }
}
