//! Gateway capability of the sync engine.
//!
//! The narrow slice of the gateway REST API the engine calls, as a
//! trait so tests can script gateway behavior (including "not found"
//! orphan signals) without a network.

use async_trait::async_trait;
use zapgate_provider::types::{CreatedInstance, InstanceInfo, PairingInfo, RemoteChat};
use zapgate_provider::{ProviderClient, ProviderError};

#[async_trait]
pub trait Gateway: Send + Sync {
    /// Raw transport state for an instance, `None` when the gateway
    /// reported no state field. Errors with
    /// [`ProviderError::NotFound`] when the session is gone (orphan).
    async fn connection_state(&self, instance_name: &str)
        -> Result<Option<String>, ProviderError>;

    async fn instance_info(
        &self,
        instance_name: &str,
    ) -> Result<Option<InstanceInfo>, ProviderError>;

    async fn fetch_chats(&self, instance_name: &str) -> Result<Vec<RemoteChat>, ProviderError>;

    async fn fetch_instances(&self) -> Result<Vec<InstanceInfo>, ProviderError>;

    async fn create_instance(
        &self,
        instance_name: &str,
        webhook_url: &str,
    ) -> Result<CreatedInstance, ProviderError>;

    async fn delete_instance(&self, instance_name: &str) -> Result<(), ProviderError>;

    async fn connect_instance(&self, instance_name: &str) -> Result<PairingInfo, ProviderError>;

    async fn set_webhook(&self, instance_name: &str, webhook_url: &str)
        -> Result<(), ProviderError>;
}

#[async_trait]
impl Gateway for ProviderClient {
    async fn connection_state(
        &self,
        instance_name: &str,
    ) -> Result<Option<String>, ProviderError> {
        Ok(ProviderClient::connection_state(self, instance_name)
            .await?
            .state)
    }

    async fn instance_info(
        &self,
        instance_name: &str,
    ) -> Result<Option<InstanceInfo>, ProviderError> {
        ProviderClient::instance_info(self, instance_name).await
    }

    async fn fetch_chats(&self, instance_name: &str) -> Result<Vec<RemoteChat>, ProviderError> {
        ProviderClient::fetch_chats(self, instance_name).await
    }

    async fn fetch_instances(&self) -> Result<Vec<InstanceInfo>, ProviderError> {
        ProviderClient::fetch_instances(self).await
    }

    async fn create_instance(
        &self,
        instance_name: &str,
        webhook_url: &str,
    ) -> Result<CreatedInstance, ProviderError> {
        ProviderClient::create_instance(self, instance_name, webhook_url).await
    }

    async fn delete_instance(&self, instance_name: &str) -> Result<(), ProviderError> {
        ProviderClient::delete_instance(self, instance_name).await
    }

    async fn connect_instance(&self, instance_name: &str) -> Result<PairingInfo, ProviderError> {
        ProviderClient::connect_instance(self, instance_name).await
    }

    async fn set_webhook(
        &self,
        instance_name: &str,
        webhook_url: &str,
    ) -> Result<(), ProviderError> {
        ProviderClient::set_webhook(self, instance_name, webhook_url).await
    }
}
