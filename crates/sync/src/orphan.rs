//! Orphan detection and recovery.
//!
//! An instance is orphaned when its gateway-side session no longer
//! exists (the gateway was wiped, or the session was deleted out of
//! band). The row is kept with its history; the user recreates the
//! session explicitly, which issues a fresh provider identity and a new
//! pairing artifact.

use serde::Serialize;
use zapgate_core::connection::ConnectionStatus;
use zapgate_core::error::CoreError;
use zapgate_core::types::DbId;
use zapgate_db::models::instance::Instance;
use zapgate_events::names;
use zapgate_provider::ProviderError;

use crate::engine::{internal, SyncEngine};

/// Outcome of a fleet consistency scan.
#[derive(Debug, Clone, Serialize)]
pub struct FleetScanReport {
    /// Local instances newly flagged as orphaned.
    pub orphaned: Vec<DbId>,
    /// Gateway-side sessions with no local row.
    pub strays: Vec<String>,
    /// Strays deleted from the gateway (when deletion was requested).
    pub deleted: Vec<String>,
}

impl SyncEngine {
    /// Flag an instance as orphaned. The flag and its context live in
    /// the settings blob; the status column goes to `error`.
    pub(crate) async fn mark_orphaned(
        &self,
        instance: &Instance,
        reason: &str,
    ) -> Result<(), CoreError> {
        tracing::warn!(
            instance_id = instance.id,
            provider_instance_id = %instance.provider_instance_id,
            reason,
            "Instance orphaned",
        );

        self.store
            .update_instance_status(instance.id, ConnectionStatus::Error.as_str())
            .await
            .map_err(internal)?;
        self.store
            .merge_instance_settings(
                instance.id,
                &serde_json::json!({
                    "orphaned": true,
                    "orphaned_at": chrono::Utc::now(),
                    "orphaned_reason": reason,
                }),
            )
            .await
            .map_err(internal)?;

        self.broadcaster.publish(
            instance.id,
            names::CONNECTION_UPDATE,
            serde_json::json!({
                "instanceId": instance.id,
                "status": ConnectionStatus::Error.as_str(),
                "orphaned": true,
                "reason": reason,
            }),
        );
        Ok(())
    }

    /// Query the gateway for an instance's live state and apply it.
    ///
    /// The response is served from the short-TTL read-through cache
    /// when a recent poll already fetched it, so dashboard refresh
    /// storms do not multiply gateway calls. A gateway "not found" is
    /// the orphan signal: the instance is flagged and the call fails
    /// with [`CoreError::Orphaned`].
    pub async fn refresh_connection_state(
        &self,
        instance_id: DbId,
    ) -> Result<ConnectionStatus, CoreError> {
        let instance = self.require_instance(instance_id).await?;

        let cached = self.responses.get("connection", instance_id).await;
        let raw_state = match cached {
            Some(value) => value.get("state").and_then(|s| s.as_str()).map(str::to_string),
            None => {
                let state = match self
                    .gateway
                    .connection_state(&instance.provider_instance_id)
                    .await
                {
                    Ok(state) => state,
                    Err(ProviderError::NotFound(_)) => {
                        self.mark_orphaned(&instance, "gateway session missing on state refresh")
                            .await?;
                        return Err(CoreError::Orphaned { id: instance_id });
                    }
                    Err(err) => return Err(CoreError::ProviderUnavailable(err.to_string())),
                };
                self.responses
                    .put(
                        "connection",
                        instance_id,
                        &serde_json::json!({ "state": state }),
                    )
                    .await;
                state
            }
        };

        let (previous, next) = self.apply_raw_state(&instance, raw_state.as_deref()).await?;
        if next != previous {
            self.broadcaster.publish(
                instance_id,
                names::CONNECTION_UPDATE,
                serde_json::json!({
                    "instanceId": instance_id,
                    "status": next.as_str(),
                    "previousStatus": previous.as_str(),
                }),
            );
        }
        Ok(next)
    }

    /// Recreate the gateway session for an orphaned instance.
    ///
    /// Issues a fresh provider identity (the old name may still be
    /// squatted on the gateway), registers the webhook, starts pairing
    /// and stores the new artifact. Local chats, contacts and messages
    /// are untouched.
    pub async fn recreate_instance(&self, instance_id: DbId) -> Result<Instance, CoreError> {
        let instance = self.require_instance(instance_id).await?;
        if !instance.is_orphaned() {
            return Err(CoreError::InvalidState(format!(
                "instance {instance_id} is not orphaned, recreate refused",
            )));
        }

        let new_provider_id = fresh_provider_id(&instance.name);
        let webhook_url = self.webhook_url(&new_provider_id);

        self.gateway
            .create_instance(&new_provider_id, &webhook_url)
            .await
            .map_err(|err| CoreError::ProviderUnavailable(err.to_string()))?;

        self.store
            .reset_instance_identity(
                instance_id,
                &new_provider_id,
                ConnectionStatus::Connecting.as_str(),
            )
            .await
            .map_err(internal)?;

        // Any cached state belongs to the dead session.
        self.responses.invalidate("connection", instance_id).await;

        // Pairing failure is not fatal: the identity swap already
        // happened and a later connect retry can issue the artifact.
        match self.gateway.connect_instance(&new_provider_id).await {
            Ok(pairing) => {
                let artifact = pairing.base64.or(pairing.pairing_code);
                if let Some(artifact) = &artifact {
                    self.store
                        .merge_instance_settings(
                            instance_id,
                            &serde_json::json!({ "pairing_code": artifact }),
                        )
                        .await
                        .map_err(internal)?;
                }
                self.broadcaster.publish(
                    instance_id,
                    names::QRCODE_UPDATED,
                    serde_json::json!({
                        "instanceId": instance_id,
                        "qrcode": { "base64": artifact },
                    }),
                );
            }
            Err(err) => {
                tracing::warn!(
                    instance_id,
                    error = %err,
                    "Recreated session but pairing start failed",
                );
            }
        }

        self.broadcaster.publish(
            instance_id,
            names::CONNECTION_UPDATE,
            serde_json::json!({
                "instanceId": instance_id,
                "status": ConnectionStatus::Connecting.as_str(),
                "recreated": true,
            }),
        );

        tracing::info!(
            instance_id,
            provider_instance_id = %new_provider_id,
            "Instance recreated with fresh gateway identity",
        );
        self.require_instance(instance_id).await
    }

    /// Cross-check the local fleet against the gateway's session list.
    ///
    /// Local instances whose session is gone are flagged as orphaned.
    /// Gateway sessions with no local row are reported as strays and,
    /// when `delete_strays` is set, deleted from the gateway.
    pub async fn scan_fleet(&self, delete_strays: bool) -> Result<FleetScanReport, CoreError> {
        let remote = self
            .gateway
            .fetch_instances()
            .await
            .map_err(|err| CoreError::ProviderUnavailable(err.to_string()))?;
        let remote_names: std::collections::HashSet<&str> =
            remote.iter().map(|i| i.instance_name.as_str()).collect();

        let local = self.store.list_instances().await.map_err(internal)?;

        let mut report = FleetScanReport {
            orphaned: Vec::new(),
            strays: Vec::new(),
            deleted: Vec::new(),
        };

        for instance in &local {
            if instance.is_orphaned() {
                continue;
            }
            if !remote_names.contains(instance.provider_instance_id.as_str()) {
                self.mark_orphaned(instance, "gateway session missing in fleet scan")
                    .await?;
                report.orphaned.push(instance.id);
            }
        }

        let local_names: std::collections::HashSet<&str> = local
            .iter()
            .map(|i| i.provider_instance_id.as_str())
            .collect();
        for info in &remote {
            if local_names.contains(info.instance_name.as_str()) {
                continue;
            }
            report.strays.push(info.instance_name.clone());
            if delete_strays {
                match self.gateway.delete_instance(&info.instance_name).await {
                    Ok(()) => report.deleted.push(info.instance_name.clone()),
                    Err(err) => {
                        tracing::warn!(
                            stray = %info.instance_name,
                            error = %err,
                            "Failed to delete stray gateway session",
                        );
                    }
                }
            }
        }

        tracing::info!(
            orphaned = report.orphaned.len(),
            strays = report.strays.len(),
            deleted = report.deleted.len(),
            "Fleet scan complete",
        );
        Ok(report)
    }
}

/// Build a fresh provider-side instance name: a slug of the display
/// name plus a random suffix, so recreations never collide with a
/// half-dead session squatting the old name.
pub(crate) fn fresh_provider_id(name: &str) -> String {
    let slug: String = name
        .to_ascii_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}_{}", slug.trim_matches('_'), &suffix[..8])
}
