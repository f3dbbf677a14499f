//! Instance lifecycle: registration, pairing start, removal.
//!
//! Registration creates the gateway-side session first, then the local
//! row; a gateway failure therefore never leaves a local row without a
//! backing session. Removal goes the other way round and tolerates an
//! already-gone session.

use serde::Serialize;
use zapgate_core::connection::ConnectionStatus;
use zapgate_core::error::CoreError;
use zapgate_core::types::DbId;
use zapgate_db::models::instance::Instance;
use zapgate_db::repositories::is_unique_violation;
use zapgate_events::names;
use zapgate_provider::ProviderError;

use crate::engine::SyncEngine;
use crate::orphan::fresh_provider_id;

/// Pairing artifact returned from a connect request.
#[derive(Debug, Clone, Serialize)]
pub struct PairingArtifact {
    /// Base64 QR code image, when the gateway issued one.
    pub base64: Option<String>,
    /// Numeric pairing code alternative.
    #[serde(rename = "pairingCode")]
    pub pairing_code: Option<String>,
}

impl SyncEngine {
    /// Register a new instance: gateway session plus local row.
    pub async fn register_instance(&self, name: &str) -> Result<Instance, CoreError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CoreError::Validation(
                "instance name must not be empty".to_string(),
            ));
        }

        let provider_id = fresh_provider_id(name);
        let webhook_url = self.webhook_url(&provider_id);
        self.gateway
            .create_instance(&provider_id, &webhook_url)
            .await
            .map_err(|err| CoreError::ProviderUnavailable(err.to_string()))?;

        let instance = match self.store.create_instance(name, &provider_id).await {
            Ok(instance) => instance,
            Err(err) => {
                // Clean up the session so a retry gets a fresh start.
                if let Err(cleanup) = self.gateway.delete_instance(&provider_id).await {
                    tracing::warn!(
                        provider_instance_id = %provider_id,
                        error = %cleanup,
                        "Failed to clean up gateway session after row insert failure",
                    );
                }
                if err
                    .downcast_ref::<sqlx::Error>()
                    .is_some_and(is_unique_violation)
                {
                    return Err(CoreError::Conflict(format!(
                        "an instance named {name} already exists",
                    )));
                }
                return Err(CoreError::Internal(err.to_string()));
            }
        };

        tracing::info!(
            instance_id = instance.id,
            provider_instance_id = %provider_id,
            "Instance registered",
        );
        Ok(instance)
    }

    /// Start (or restart) device pairing for an instance and return the
    /// issued artifact.
    pub async fn start_pairing(&self, instance_id: DbId) -> Result<PairingArtifact, CoreError> {
        let instance = self.require_instance(instance_id).await?;
        if instance.is_orphaned() {
            return Err(CoreError::Orphaned { id: instance_id });
        }

        let pairing = match self
            .gateway
            .connect_instance(&instance.provider_instance_id)
            .await
        {
            Ok(pairing) => pairing,
            Err(ProviderError::NotFound(_)) => {
                self.mark_orphaned(&instance, "gateway session missing on connect")
                    .await?;
                return Err(CoreError::Orphaned { id: instance_id });
            }
            Err(err) => return Err(CoreError::ProviderUnavailable(err.to_string())),
        };

        let artifact = PairingArtifact {
            base64: pairing.base64,
            pairing_code: pairing.pairing_code,
        };
        if let Some(value) = artifact.base64.as_deref().or(artifact.pairing_code.as_deref()) {
            self.store
                .merge_instance_settings(
                    instance_id,
                    &serde_json::json!({ "pairing_code": value }),
                )
                .await
                .map_err(crate::engine::internal)?;
        }
        if instance.status != ConnectionStatus::Connecting.as_str() {
            self.store
                .update_instance_status(instance_id, ConnectionStatus::Connecting.as_str())
                .await
                .map_err(crate::engine::internal)?;
        }

        self.broadcaster.publish(
            instance_id,
            names::QRCODE_UPDATED,
            serde_json::json!({
                "instanceId": instance_id,
                "qrcode": { "base64": artifact.base64, "pairingCode": artifact.pairing_code },
            }),
        );
        Ok(artifact)
    }

    /// Delete an instance locally and tear down its gateway session.
    /// An already-missing session is fine; the local delete proceeds.
    pub async fn remove_instance(&self, instance_id: DbId) -> Result<(), CoreError> {
        let instance = self.require_instance(instance_id).await?;

        match self
            .gateway
            .delete_instance(&instance.provider_instance_id)
            .await
        {
            Ok(()) | Err(ProviderError::NotFound(_)) => {}
            Err(err) => {
                tracing::warn!(
                    instance_id,
                    error = %err,
                    "Gateway session delete failed, removing local row anyway",
                );
            }
        }

        self.store
            .delete_instance(instance_id)
            .await
            .map_err(crate::engine::internal)?;
        tracing::info!(instance_id, "Instance removed");
        Ok(())
    }
}
