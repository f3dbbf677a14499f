//! Inbound webhook router.
//!
//! The gateway retries deliveries it considers failed, so the router
//! acknowledges everything it can attribute to an instance and absorbs
//! handler failures into logs. Duplicate deliveries are expected; every
//! persistence path below is idempotent.

use serde_json::Value;
use zapgate_core::connection::ConnectionStatus;
use zapgate_core::jid;
use zapgate_core::message::{extract_content, DeliveryStatus};
use zapgate_core::types::Timestamp;
use zapgate_core::webhook::{WebhookEnvelope, WebhookEvent};
use zapgate_db::models::chat::ChatSnapshot;
use zapgate_db::models::contact::ContactUpsert;
use zapgate_db::models::instance::Instance;
use zapgate_db::models::message::NewMessage;
use zapgate_events::names;
use zapgate_provider::types::RemoteChat;

use crate::engine::SyncEngine;

/// Attempts for transient store failures on bulk contact/chat events.
/// The gateway re-delivers the whole event anyway, so one quick retry
/// is enough.
const BULK_RETRY_ATTEMPTS: u32 = 2;

impl SyncEngine {
    /// Route one webhook delivery.
    ///
    /// Never fails: a delivery for an unknown instance (deleted locally,
    /// or a foreign tenant's) is acknowledged and dropped, and handler
    /// errors are logged so the gateway does not retry a delivery whose
    /// side effects already landed.
    pub async fn handle_webhook(&self, provider_instance_id: &str, envelope: WebhookEnvelope) {
        let event = WebhookEvent::normalize(&envelope.event);

        let instance = match self
            .store
            .find_instance_by_provider_id(provider_instance_id)
            .await
        {
            Ok(Some(instance)) => instance,
            Ok(None) => {
                tracing::debug!(
                    provider_instance_id,
                    event = %envelope.event,
                    "Webhook for unknown instance, acknowledged and dropped",
                );
                return;
            }
            Err(err) => {
                tracing::error!(
                    provider_instance_id,
                    error = %err,
                    "Instance lookup failed, dropping webhook",
                );
                return;
            }
        };

        let result = match &event {
            WebhookEvent::QrcodeUpdated => self.on_qrcode_updated(&instance, &envelope.data).await,
            WebhookEvent::ConnectionUpdate => {
                self.on_connection_update(&instance, &envelope.data).await
            }
            WebhookEvent::MessagesUpsert => self.on_messages_upsert(&instance, &envelope.data).await,
            WebhookEvent::MessagesUpdate => self.on_messages_update(&instance, &envelope.data).await,
            WebhookEvent::ContactsUpsert | WebhookEvent::ContactsUpdate => {
                self.on_contacts_event(&instance, &envelope.data).await
            }
            WebhookEvent::ChatsUpsert | WebhookEvent::ChatsUpdate => {
                self.on_chats_event(&instance, &envelope.data).await
            }
            WebhookEvent::PresenceUpdate => {
                self.on_presence_update(&instance, &envelope.data);
                Ok(())
            }
            WebhookEvent::ApplicationStartup => {
                tracing::info!(instance_id = instance.id, "Gateway session (re)started");
                Ok(())
            }
            WebhookEvent::Unhandled(raw) => {
                tracing::debug!(instance_id = instance.id, event = %raw, "Unhandled webhook event");
                Ok(())
            }
        };

        if let Err(err) = result {
            tracing::error!(
                instance_id = instance.id,
                event = %envelope.event,
                error = %err,
                "Webhook handler failed",
            );
        }
    }

    /// A new pairing artifact was issued. Store it and flip the
    /// instance back to `connecting` so the state mapper treats the
    /// link as in progress.
    async fn on_qrcode_updated(&self, instance: &Instance, data: &Value) -> anyhow::Result<()> {
        let qrcode = data.get("qrcode").unwrap_or(data);
        let artifact = qrcode
            .get("base64")
            .or_else(|| qrcode.get("code"))
            .or_else(|| qrcode.get("pairingCode"))
            .and_then(|v| v.as_str());
        let Some(artifact) = artifact else {
            anyhow::bail!("qrcode event without a pairing artifact");
        };

        self.store
            .merge_instance_settings(
                instance.id,
                &serde_json::json!({ "pairing_code": artifact }),
            )
            .await?;
        if instance.status != ConnectionStatus::Connecting.as_str() {
            self.store
                .update_instance_status(instance.id, ConnectionStatus::Connecting.as_str())
                .await?;
        }

        self.broadcaster.publish(
            instance.id,
            names::QRCODE_UPDATED,
            serde_json::json!({
                "instanceId": instance.id,
                "qrcode": qrcode.clone(),
            }),
        );
        Ok(())
    }

    /// Transport state changed. Apply the mapping and, on a transition
    /// into `connected`, schedule the automatic reconciliation.
    async fn on_connection_update(&self, instance: &Instance, data: &Value) -> anyhow::Result<()> {
        let raw_state = data
            .get("state")
            .or_else(|| data.get("connection"))
            .and_then(|v| v.as_str());

        let (previous, next) = self.apply_raw_state(instance, raw_state).await?;

        if next == ConnectionStatus::Connected && previous != ConnectionStatus::Connected {
            // Duplicate deliveries race here; the auto rate key is
            // consumed at schedule time, so only one sync survives.
            self.schedule_auto_sync(instance.id).await;
        }

        self.broadcaster.publish(
            instance.id,
            names::CONNECTION_UPDATE,
            serde_json::json!({
                "instanceId": instance.id,
                "status": next.as_str(),
                "previousStatus": previous.as_str(),
                "rawState": raw_state,
            }),
        );
        Ok(())
    }

    async fn on_messages_upsert(&self, instance: &Instance, data: &Value) -> anyhow::Result<()> {
        for record in collect_records(data, "messages") {
            if let Err(err) = self.ingest_message(instance, &record).await {
                tracing::warn!(
                    instance_id = instance.id,
                    error = %err,
                    "Failed to ingest message from webhook",
                );
            }
        }
        Ok(())
    }

    /// Persist one message record and fan out the change.
    ///
    /// Keyed by `(instance, message id)`; a re-delivered message is a
    /// no-op with no chat mutation and no events.
    async fn ingest_message(&self, instance: &Instance, record: &Value) -> anyhow::Result<()> {
        let key = record
            .get("key")
            .ok_or_else(|| anyhow::anyhow!("message record without key"))?;
        let remote_jid = key
            .get("remoteJid")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("message key without remoteJid"))?;
        let message_id = key
            .get("id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("message key without id"))?;
        let from_me = key.get("fromMe").and_then(|v| v.as_bool()).unwrap_or(false);

        if jid::is_broadcast(remote_jid) {
            return Ok(());
        }
        let Some(phone) = jid::normalize_phone(remote_jid) else {
            return Ok(());
        };

        let contact_fields = ContactUpsert {
            push_name: record
                .get("pushName")
                .and_then(|v| v.as_str())
                .map(String::from),
            is_group: Some(jid::is_group(remote_jid)),
            ..Default::default()
        };
        let (contact, _) = self
            .store
            .upsert_contact(instance.id, &phone, &contact_fields)
            .await?;

        // Ensure the chat row exists; the last-message snapshot is only
        // applied once the message itself turns out to be new.
        let (chat, _) = self
            .store
            .upsert_chat(instance.id, contact.id, remote_jid, &ChatSnapshot::default())
            .await?;

        let content = extract_content(record.get("message"));
        let message_timestamp: Option<Timestamp> = record
            .get("messageTimestamp")
            .and_then(|v| v.as_i64())
            .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0));
        let delivery_status = if from_me {
            DeliveryStatus::Sent
        } else {
            DeliveryStatus::Delivered
        };

        let new = NewMessage {
            instance_id: instance.id,
            chat_id: chat.id,
            contact_id: Some(contact.id),
            message_id: message_id.to_string(),
            from_me,
            message_type: content.kind.as_str().to_string(),
            content: content.text.clone(),
            media_url: content.media_url.clone(),
            message_timestamp,
            delivery_status: delivery_status.as_str().to_string(),
        };
        let (message, created) = self.store.insert_message_if_absent(&new).await?;
        if !created {
            tracing::debug!(
                instance_id = instance.id,
                message_id,
                "Duplicate message delivery, skipped",
            );
            return Ok(());
        }

        let snapshot = ChatSnapshot {
            last_message: Some(content.summary()),
            last_message_type: Some(content.kind.as_str().to_string()),
            last_message_sender: Some(if from_me { "me".to_string() } else { phone }),
            last_message_at: message_timestamp.or_else(|| Some(chrono::Utc::now())),
        };
        self.store
            .record_chat_message(chat.id, &snapshot, !from_me)
            .await?;

        let message_payload = serde_json::to_value(&message).unwrap_or_default();
        self.broadcaster
            .publish(instance.id, names::NEW_MESSAGE, message_payload.clone());
        self.broadcaster.publish(
            instance.id,
            names::CHATS_UPDATE,
            serde_json::json!({
                "instanceId": instance.id,
                "chatId": chat.chat_id,
                "lastMessage": snapshot.last_message,
                "lastMessageAt": snapshot.last_message_at,
            }),
        );
        if !from_me {
            self.broadcaster
                .publish(instance.id, names::MESSAGE_RECEIVED, message_payload);
        }
        Ok(())
    }

    /// Delivery-status (ack) updates. An update for a message that was
    /// never stored, or that arrives before its upsert, is recorded as
    /// a no-op; the status will be correct once the message lands.
    async fn on_messages_update(&self, instance: &Instance, data: &Value) -> anyhow::Result<()> {
        for record in collect_records(data, "messages") {
            let message_id = record
                .get("key")
                .and_then(|k| k.get("id"))
                .or_else(|| record.get("keyId"))
                .and_then(|v| v.as_str());
            let Some(message_id) = message_id else {
                continue;
            };

            let ack = record
                .get("status")
                .or_else(|| record.get("ack"))
                .or_else(|| record.get("update").and_then(|u| u.get("status")));
            let Some(status) = ack.and_then(DeliveryStatus::from_ack) else {
                tracing::debug!(
                    instance_id = instance.id,
                    message_id,
                    "Unrecognized ack value, skipped",
                );
                continue;
            };

            let updated = self
                .store
                .update_message_status(instance.id, message_id, status.as_str())
                .await?;
            if !updated {
                tracing::debug!(
                    instance_id = instance.id,
                    message_id,
                    "Status update for unknown message, no-op",
                );
                continue;
            }

            self.broadcaster.publish(
                instance.id,
                names::MESSAGE_STATUS_UPDATE,
                serde_json::json!({
                    "instanceId": instance.id,
                    "messageId": message_id,
                    "status": status.as_str(),
                }),
            );
        }
        Ok(())
    }

    /// Bulk contact pushes. Each record is retried once on a transient
    /// store failure; failures beyond that are logged per record so one
    /// bad entry does not sink the batch.
    async fn on_contacts_event(&self, instance: &Instance, data: &Value) -> anyhow::Result<()> {
        let mut processed = 0usize;
        for record in collect_records(data, "contacts") {
            let Some(record_jid) = record.get("id").and_then(|v| v.as_str()) else {
                continue;
            };
            let Some(phone) = jid::normalize_phone(record_jid) else {
                continue;
            };

            let fields = ContactUpsert {
                name: record.get("name").and_then(|v| v.as_str()).map(String::from),
                push_name: record
                    .get("pushName")
                    .or_else(|| record.get("notify"))
                    .and_then(|v| v.as_str())
                    .map(String::from),
                avatar_url: record
                    .get("profilePictureUrl")
                    .and_then(|v| v.as_str())
                    .map(String::from),
                is_group: Some(jid::is_group(record_jid)),
                ..Default::default()
            };

            match self
                .with_retry(|| self.store.upsert_contact(instance.id, &phone, &fields))
                .await
            {
                Ok(_) => processed += 1,
                Err(err) => {
                    tracing::warn!(
                        instance_id = instance.id,
                        contact = %record_jid,
                        error = %err,
                        "Contact upsert failed after retry",
                    );
                }
            }
        }

        if processed > 0 {
            self.broadcaster.publish(
                instance.id,
                names::CONTACTS_UPDATE,
                serde_json::json!({ "instanceId": instance.id, "count": processed }),
            );
        }
        Ok(())
    }

    /// Bulk chat pushes; same shape as a reconciliation entry.
    async fn on_chats_event(&self, instance: &Instance, data: &Value) -> anyhow::Result<()> {
        let mut processed = 0usize;
        for record in collect_records(data, "chats") {
            let entry: RemoteChat = match serde_json::from_value(record) {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::debug!(instance_id = instance.id, error = %err, "Malformed chat record");
                    continue;
                }
            };
            if jid::is_broadcast(&entry.id) || jid::normalize_phone(&entry.id).is_none() {
                continue;
            }

            match self
                .with_retry(|| self.process_chat_entry(instance, &entry))
                .await
            {
                Ok(_) => processed += 1,
                Err(err) => {
                    tracing::warn!(
                        instance_id = instance.id,
                        chat = %entry.id,
                        error = %err,
                        "Chat upsert failed after retry",
                    );
                }
            }
        }

        if processed > 0 {
            self.broadcaster.publish(
                instance.id,
                names::CHATS_UPDATE,
                serde_json::json!({ "instanceId": instance.id, "count": processed }),
            );
        }
        Ok(())
    }

    /// Presence is relayed to subscribers, never persisted. The gateway
    /// may batch several records into one event; only the first is
    /// forwarded.
    fn on_presence_update(&self, instance: &Instance, data: &Value) {
        let Some(record) = collect_records(data, "presences").into_iter().next() else {
            return;
        };
        self.broadcaster.publish(
            instance.id,
            names::PRESENCE_UPDATE,
            serde_json::json!({ "instanceId": instance.id, "presence": record }),
        );
    }

    async fn with_retry<T, F, Fut>(&self, mut op: F) -> anyhow::Result<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = anyhow::Result<T>>,
    {
        let mut last_err = None;
        for attempt in 1..=BULK_RETRY_ATTEMPTS {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    last_err = Some(err);
                    if attempt < BULK_RETRY_ATTEMPTS {
                        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
                    }
                }
            }
        }
        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("retry loop without attempts")))
    }
}

/// Pull the record list out of a loosely shaped payload: `{key: [...]}`,
/// a bare array, or a single record object.
fn collect_records(data: &Value, key: &str) -> Vec<Value> {
    if let Some(items) = data.get(key).and_then(|v| v.as_array()) {
        return items.clone();
    }
    if let Some(items) = data.as_array() {
        return items.clone();
    }
    if data.is_object() {
        return vec![data.clone()];
    }
    Vec::new()
}
