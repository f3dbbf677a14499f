//! REST client for the gateway HTTP endpoints.

use serde::de::DeserializeOwned;

use crate::error::ProviderError;
use crate::types::{ConnectionState, CreatedInstance, InstanceInfo, PairingInfo, RemoteChat};

/// HTTP client for one gateway deployment.
///
/// Instances are addressed by their gateway-assigned name; a single
/// client (and its pooled connections) serves all of them.
#[derive(Clone)]
pub struct ProviderClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl ProviderClient {
    /// Create a client for a gateway deployment.
    ///
    /// * `base_url` - e.g. `http://gateway:8080`, no trailing slash.
    /// * `api_key`  - global gateway key, sent as the `apikey` header.
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            api_key,
        }
    }

    /// Register a new instance with the gateway, including the webhook
    /// target it should deliver events to.
    pub async fn create_instance(
        &self,
        instance_name: &str,
        webhook_url: &str,
    ) -> Result<CreatedInstance, ProviderError> {
        let body = serde_json::json!({
            "instanceName": instance_name,
            "qrcode": true,
            "webhook": webhook_url,
            "webhook_by_events": false,
        });
        let response = self
            .client
            .post(format!("{}/instance/create", self.base_url))
            .header("apikey", &self.api_key)
            .json(&body)
            .send()
            .await?;
        self.parse_response(response, instance_name).await
    }

    /// Remove an instance from the gateway.
    pub async fn delete_instance(&self, instance_name: &str) -> Result<(), ProviderError> {
        let response = self
            .client
            .delete(format!("{}/instance/delete/{}", self.base_url, instance_name))
            .header("apikey", &self.api_key)
            .send()
            .await?;
        self.check_status(response, instance_name).await
    }

    /// Current transport state for an instance.
    ///
    /// A 404 here is the orphan signal: the local row references a
    /// session the gateway no longer has.
    pub async fn connection_state(
        &self,
        instance_name: &str,
    ) -> Result<ConnectionState, ProviderError> {
        let response = self
            .client
            .get(format!(
                "{}/instance/connectionState/{}",
                self.base_url, instance_name
            ))
            .header("apikey", &self.api_key)
            .send()
            .await?;
        // Some gateway versions nest the state under "instance".
        let value: serde_json::Value = self.parse_response(response, instance_name).await?;
        let state = value
            .get("instance")
            .unwrap_or(&value)
            .get("state")
            .and_then(|v| v.as_str())
            .map(String::from);
        Ok(ConnectionState { state })
    }

    /// Start (or restart) the connection for an instance, returning the
    /// pairing artifact when one is issued.
    pub async fn connect_instance(
        &self,
        instance_name: &str,
    ) -> Result<PairingInfo, ProviderError> {
        let response = self
            .client
            .get(format!("{}/instance/connect/{}", self.base_url, instance_name))
            .header("apikey", &self.api_key)
            .send()
            .await?;
        self.parse_response(response, instance_name).await
    }

    /// All instances the gateway currently knows about. Used by the
    /// fleet-level drift scan.
    pub async fn fetch_instances(&self) -> Result<Vec<InstanceInfo>, ProviderError> {
        let response = self
            .client
            .get(format!("{}/instance/fetchInstances", self.base_url))
            .header("apikey", &self.api_key)
            .send()
            .await?;
        // The endpoint wraps each entry as {"instance": {...}}.
        let entries: Vec<serde_json::Value> = self.parse_response(response, "").await?;
        let infos = entries
            .into_iter()
            .filter_map(|entry| {
                let inner = entry.get("instance").cloned().unwrap_or(entry);
                serde_json::from_value(inner).ok()
            })
            .collect();
        Ok(infos)
    }

    /// Details of one instance, including the owner JID once paired.
    pub async fn instance_info(
        &self,
        instance_name: &str,
    ) -> Result<Option<InstanceInfo>, ProviderError> {
        let infos = self.fetch_instances().await?;
        Ok(infos
            .into_iter()
            .find(|info| info.instance_name == instance_name))
    }

    /// Full chat list for an instance. The reconciliation pass filters
    /// and batches this; the client returns it verbatim.
    pub async fn fetch_chats(&self, instance_name: &str) -> Result<Vec<RemoteChat>, ProviderError> {
        let response = self
            .client
            .get(format!("{}/chat/findChats/{}", self.base_url, instance_name))
            .header("apikey", &self.api_key)
            .send()
            .await?;
        self.parse_response(response, instance_name).await
    }

    /// Point the gateway's webhook deliveries for an instance at `url`.
    pub async fn set_webhook(
        &self,
        instance_name: &str,
        webhook_url: &str,
    ) -> Result<(), ProviderError> {
        let body = serde_json::json!({
            "url": webhook_url,
            "webhook_by_events": false,
            "events": [
                "QRCODE_UPDATED",
                "CONNECTION_UPDATE",
                "MESSAGES_UPSERT",
                "MESSAGES_UPDATE",
                "CONTACTS_UPSERT",
                "CONTACTS_UPDATE",
                "CHATS_UPSERT",
                "CHATS_UPDATE",
                "PRESENCE_UPDATE",
                "APPLICATION_STARTUP",
            ],
        });
        let response = self
            .client
            .post(format!("{}/webhook/set/{}", self.base_url, instance_name))
            .header("apikey", &self.api_key)
            .json(&body)
            .send()
            .await?;
        self.check_status(response, instance_name).await
    }

    // ---- private helpers ----

    /// Map the response status: 404 becomes [`ProviderError::NotFound`],
    /// other non-2xx statuses become [`ProviderError::Api`].
    async fn ensure_success(
        &self,
        response: reqwest::Response,
        instance_name: &str,
    ) -> Result<reqwest::Response, ProviderError> {
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ProviderError::NotFound(instance_name.to_string()));
        }
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            tracing::warn!(
                instance = instance_name,
                status = status.as_u16(),
                %body,
                "gateway request failed"
            );
            return Err(ProviderError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
        instance_name: &str,
    ) -> Result<T, ProviderError> {
        let response = self.ensure_success(response, instance_name).await?;
        Ok(response.json::<T>().await?)
    }

    /// Assert a success status, discarding the body.
    async fn check_status(
        &self,
        response: reqwest::Response,
        instance_name: &str,
    ) -> Result<(), ProviderError> {
        self.ensure_success(response, instance_name).await?;
        Ok(())
    }
}
