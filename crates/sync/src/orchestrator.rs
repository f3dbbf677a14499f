//! Full reconciliation: pull the gateway's chat list and merge it into
//! the local store, batch by batch, with progress fan-out.

use serde::Serialize;
use zapgate_cache::keys;
use zapgate_core::error::CoreError;
use zapgate_core::jid;
use zapgate_core::message::extract_content;
use zapgate_core::types::{DbId, Timestamp};
use zapgate_db::models::chat::ChatSnapshot;
use zapgate_db::models::contact::ContactUpsert;
use zapgate_db::models::instance::Instance;
use zapgate_events::names;
use zapgate_events::progress::{scale_progress, SyncComplete, SyncProgress, SyncStart, SyncType};
use zapgate_provider::types::RemoteChat;
use zapgate_provider::ProviderError;

use crate::engine::{internal, SyncEngine};

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    #[serde(rename = "createdCount")]
    pub created: usize,
    #[serde(rename = "updatedCount")]
    pub updated: usize,
    #[serde(rename = "totalCount")]
    pub total: usize,
    /// Entries that failed; never aborts the pass.
    pub failures: Vec<SyncFailure>,
}

/// One failed chat entry, kept for the final report.
#[derive(Debug, Clone, Serialize)]
pub struct SyncFailure {
    pub chat_jid: String,
    pub error: String,
}

impl SyncEngine {
    /// User-triggered reconciliation.
    ///
    /// Preconditions: the instance exists, is not orphaned, is
    /// `connected` or `connecting` (a `connecting` sync is best-effort;
    /// the gateway may return partial data), and the interactive
    /// rate-limit window has room.
    pub async fn reconcile(&self, instance_id: DbId) -> Result<SyncReport, CoreError> {
        let instance = self.require_instance(instance_id).await?;

        if instance.is_orphaned() {
            return Err(CoreError::Orphaned { id: instance_id });
        }
        if !matches!(instance.status.as_str(), "connected" | "connecting") {
            return Err(CoreError::InvalidState(format!(
                "instance {} is {}, sync requires connected or connecting",
                instance_id, instance.status
            )));
        }

        let limits = &self.config.limits;
        let allowed = self
            .limiter
            .try_acquire(
                &keys::rate_sync_manual(instance_id),
                limits.manual_limit,
                limits.manual_window,
            )
            .await;
        if !allowed {
            return Err(CoreError::RateLimited {
                retry_after_secs: limits.manual_window.as_secs(),
            });
        }

        self.run_reconciliation(&instance, SyncType::Manual).await
    }

    /// Run one reconciliation pass with start/complete bookkeeping.
    ///
    /// The rate limit is the caller's concern: manual syncs check it in
    /// [`reconcile`](Self::reconcile), automatic syncs consume the auto
    /// key at schedule time.
    pub(crate) async fn run_reconciliation(
        &self,
        instance: &Instance,
        sync_type: SyncType,
    ) -> Result<SyncReport, CoreError> {
        let start = SyncStart::new(instance.id, sync_type);
        let payload = serde_json::to_value(&start).unwrap_or_default();
        self.broadcaster
            .publish(instance.id, names::SYNC_START, payload.clone());
        self.progress.put(instance.id, &payload).await;

        match self.sync_chats(instance, sync_type).await {
            Ok(report) => {
                let complete = SyncComplete::completed(instance.id, sync_type);
                self.broadcaster.publish(
                    instance.id,
                    names::SYNC_COMPLETE,
                    serde_json::to_value(&complete).unwrap_or_default(),
                );
                self.progress.clear(instance.id).await;
                tracing::info!(
                    instance_id = instance.id,
                    created = report.created,
                    updated = report.updated,
                    total = report.total,
                    failed = report.failures.len(),
                    "Reconciliation complete",
                );
                Ok(report)
            }
            Err(err) => {
                let complete = SyncComplete::failed(instance.id, sync_type, err.to_string());
                self.broadcaster.publish(
                    instance.id,
                    names::SYNC_COMPLETE,
                    serde_json::to_value(&complete).unwrap_or_default(),
                );
                self.progress.clear(instance.id).await;
                tracing::error!(instance_id = instance.id, error = %err, "Reconciliation failed");
                Err(err)
            }
        }
    }

    /// Fetch, filter, batch and merge the gateway chat list.
    async fn sync_chats(
        &self,
        instance: &Instance,
        sync_type: SyncType,
    ) -> Result<SyncReport, CoreError> {
        let chats = match self
            .gateway
            .fetch_chats(&instance.provider_instance_id)
            .await
        {
            Ok(chats) => chats,
            Err(ProviderError::NotFound(_)) => {
                self.mark_orphaned(instance, "gateway session missing during sync")
                    .await?;
                return Err(CoreError::Orphaned { id: instance.id });
            }
            Err(err) => return Err(CoreError::ProviderUnavailable(err.to_string())),
        };

        // Broadcast pseudo-chats and address-less entries are not
        // reconcilable.
        let eligible: Vec<&RemoteChat> = chats
            .iter()
            .filter(|c| !jid::is_broadcast(&c.id) && jid::normalize_phone(&c.id).is_some())
            .collect();

        let total = eligible.len();
        let mut report = SyncReport {
            created: 0,
            updated: 0,
            total,
            failures: Vec::new(),
        };
        let mut processed = 0usize;

        for batch in eligible.chunks(self.config.batch_size.max(1)) {
            for entry in batch {
                match self.process_chat_entry(instance, entry).await {
                    Ok(created) => {
                        if created {
                            report.created += 1;
                        } else {
                            report.updated += 1;
                        }
                    }
                    Err(err) => {
                        tracing::warn!(
                            instance_id = instance.id,
                            chat = %entry.id,
                            error = %err,
                            "Chat entry failed during reconciliation",
                        );
                        report.failures.push(SyncFailure {
                            chat_jid: entry.id.clone(),
                            error: err.to_string(),
                        });
                    }
                }
                processed += 1;
            }

            let progress = SyncProgress {
                instance_id: instance.id,
                sync_type,
                status: "syncing".to_string(),
                step: "processing chats".to_string(),
                progress: scale_progress(processed, total),
                contacts_processed: processed,
                chats_processed: processed,
                total_contacts: total,
                total_chats: total,
                timestamp: chrono::Utc::now(),
            };
            let payload = serde_json::to_value(&progress).unwrap_or_default();
            self.broadcaster
                .publish(instance.id, names::SYNC_PROGRESS, payload.clone());
            self.progress.put(instance.id, &payload).await;

            if processed < total {
                // Yield between batches so concurrent webhook handling
                // and other instances' syncs get store time.
                tokio::time::sleep(self.config.batch_pause).await;
            }
        }

        self.store
            .touch_instance_last_seen(instance.id)
            .await
            .map_err(internal)?;

        Ok(report)
    }

    /// Merge one remote chat entry: contact upsert, then chat upsert
    /// carrying the owning contact id and a synthesized last-message
    /// summary. Returns whether the chat row was created.
    pub(crate) async fn process_chat_entry(
        &self,
        instance: &Instance,
        entry: &RemoteChat,
    ) -> anyhow::Result<bool> {
        let phone = jid::normalize_phone(&entry.id)
            .ok_or_else(|| anyhow::anyhow!("chat {} has no usable address", entry.id))?;

        let contact_fields = ContactUpsert {
            name: entry.name.clone(),
            push_name: entry.push_name.clone(),
            is_group: Some(jid::is_group(&entry.id)),
            ..Default::default()
        };
        let (contact, _) = self
            .store
            .upsert_contact(instance.id, &phone, &contact_fields)
            .await?;

        let snapshot = snapshot_from_remote(entry);
        let (_, chat_created) = self
            .store
            .upsert_chat(instance.id, contact.id, &entry.id, &snapshot)
            .await?;

        Ok(chat_created)
    }
}

/// Build a chat last-message snapshot from a remote entry: the
/// conversation text when present, else the kind placeholder.
fn snapshot_from_remote(entry: &RemoteChat) -> ChatSnapshot {
    let content = extract_content(
        entry
            .last_message
            .as_ref()
            .and_then(|m| m.get("message")),
    );
    let last_message_at: Option<Timestamp> = entry
        .conversation_timestamp
        .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0));

    match &entry.last_message {
        Some(_) => ChatSnapshot {
            last_message: Some(content.summary()),
            last_message_type: Some(content.kind.as_str().to_string()),
            last_message_sender: None,
            last_message_at,
        },
        None => ChatSnapshot {
            last_message: None,
            last_message_type: None,
            last_message_sender: None,
            last_message_at,
        },
    }
}
