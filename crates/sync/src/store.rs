//! Persistence capability of the sync engine.
//!
//! [`SyncStore`] is the narrow slice of the repository layer the engine
//! needs. [`PgStore`] delegates to the `zapgate_db` repositories; tests
//! provide an in-memory implementation honoring the same uniqueness
//! contracts.

use async_trait::async_trait;
use zapgate_core::types::DbId;
use zapgate_db::models::chat::{Chat, ChatSnapshot};
use zapgate_db::models::contact::{Contact, ContactUpsert};
use zapgate_db::models::instance::Instance;
use zapgate_db::models::message::{Message, NewMessage};
use zapgate_db::repositories::{ChatRepo, ContactRepo, InstanceRepo, MessageRepo};
use zapgate_db::DbPool;

/// Store operations used by reconciliation, webhook handling and orphan
/// recovery.
///
/// The `upsert_*` methods carry the idempotent-upsert contract: keyed
/// by the entity's natural key, returning `(row, created)`, resolving
/// concurrent-writer races internally instead of surfacing them.
#[async_trait]
pub trait SyncStore: Send + Sync {
    async fn create_instance(
        &self,
        name: &str,
        provider_instance_id: &str,
    ) -> anyhow::Result<Instance>;

    /// Returns whether a row was deleted.
    async fn delete_instance(&self, id: DbId) -> anyhow::Result<bool>;

    async fn find_instance(&self, id: DbId) -> anyhow::Result<Option<Instance>>;

    async fn find_instance_by_provider_id(
        &self,
        provider_instance_id: &str,
    ) -> anyhow::Result<Option<Instance>>;

    async fn list_instances(&self) -> anyhow::Result<Vec<Instance>>;

    async fn update_instance_status(&self, id: DbId, status: &str) -> anyhow::Result<()>;

    async fn update_instance_phone(&self, id: DbId, phone_number: &str) -> anyhow::Result<()>;

    async fn touch_instance_last_seen(&self, id: DbId) -> anyhow::Result<()>;

    async fn merge_instance_settings(
        &self,
        id: DbId,
        patch: &serde_json::Value,
    ) -> anyhow::Result<()>;

    async fn reset_instance_identity(
        &self,
        id: DbId,
        provider_instance_id: &str,
        status: &str,
    ) -> anyhow::Result<()>;

    async fn upsert_contact(
        &self,
        instance_id: DbId,
        phone: &str,
        fields: &ContactUpsert,
    ) -> anyhow::Result<(Contact, bool)>;

    async fn upsert_chat(
        &self,
        instance_id: DbId,
        contact_id: DbId,
        chat_id: &str,
        snapshot: &ChatSnapshot,
    ) -> anyhow::Result<(Chat, bool)>;

    async fn record_chat_message(
        &self,
        chat_row_id: DbId,
        snapshot: &ChatSnapshot,
        increment_unread: bool,
    ) -> anyhow::Result<()>;

    async fn insert_message_if_absent(&self, new: &NewMessage)
        -> anyhow::Result<(Message, bool)>;

    async fn update_message_status(
        &self,
        instance_id: DbId,
        message_id: &str,
        delivery_status: &str,
    ) -> anyhow::Result<bool>;
}

/// Production store backed by PostgreSQL.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SyncStore for PgStore {
    async fn create_instance(
        &self,
        name: &str,
        provider_instance_id: &str,
    ) -> anyhow::Result<Instance> {
        Ok(InstanceRepo::create(&self.pool, name, provider_instance_id).await?)
    }

    async fn delete_instance(&self, id: DbId) -> anyhow::Result<bool> {
        Ok(InstanceRepo::delete(&self.pool, id).await?)
    }

    async fn find_instance(&self, id: DbId) -> anyhow::Result<Option<Instance>> {
        Ok(InstanceRepo::find_by_id(&self.pool, id).await?)
    }

    async fn find_instance_by_provider_id(
        &self,
        provider_instance_id: &str,
    ) -> anyhow::Result<Option<Instance>> {
        Ok(InstanceRepo::find_by_provider_id(&self.pool, provider_instance_id).await?)
    }

    async fn list_instances(&self) -> anyhow::Result<Vec<Instance>> {
        Ok(InstanceRepo::list(&self.pool).await?)
    }

    async fn update_instance_status(&self, id: DbId, status: &str) -> anyhow::Result<()> {
        Ok(InstanceRepo::update_status(&self.pool, id, status).await?)
    }

    async fn update_instance_phone(&self, id: DbId, phone_number: &str) -> anyhow::Result<()> {
        Ok(InstanceRepo::update_phone_number(&self.pool, id, phone_number).await?)
    }

    async fn touch_instance_last_seen(&self, id: DbId) -> anyhow::Result<()> {
        Ok(InstanceRepo::touch_last_seen(&self.pool, id).await?)
    }

    async fn merge_instance_settings(
        &self,
        id: DbId,
        patch: &serde_json::Value,
    ) -> anyhow::Result<()> {
        Ok(InstanceRepo::merge_settings(&self.pool, id, patch).await?)
    }

    async fn reset_instance_identity(
        &self,
        id: DbId,
        provider_instance_id: &str,
        status: &str,
    ) -> anyhow::Result<()> {
        Ok(InstanceRepo::reset_provider_identity(&self.pool, id, provider_instance_id, status)
            .await?)
    }

    async fn upsert_contact(
        &self,
        instance_id: DbId,
        phone: &str,
        fields: &ContactUpsert,
    ) -> anyhow::Result<(Contact, bool)> {
        Ok(ContactRepo::upsert(&self.pool, instance_id, phone, fields).await?)
    }

    async fn upsert_chat(
        &self,
        instance_id: DbId,
        contact_id: DbId,
        chat_id: &str,
        snapshot: &ChatSnapshot,
    ) -> anyhow::Result<(Chat, bool)> {
        Ok(ChatRepo::upsert(&self.pool, instance_id, contact_id, chat_id, snapshot).await?)
    }

    async fn record_chat_message(
        &self,
        chat_row_id: DbId,
        snapshot: &ChatSnapshot,
        increment_unread: bool,
    ) -> anyhow::Result<()> {
        Ok(ChatRepo::record_message(&self.pool, chat_row_id, snapshot, increment_unread).await?)
    }

    async fn insert_message_if_absent(
        &self,
        new: &NewMessage,
    ) -> anyhow::Result<(Message, bool)> {
        Ok(MessageRepo::insert_if_absent(&self.pool, new).await?)
    }

    async fn update_message_status(
        &self,
        instance_id: DbId,
        message_id: &str,
        delivery_status: &str,
    ) -> anyhow::Result<bool> {
        Ok(
            MessageRepo::update_delivery_status(&self.pool, instance_id, message_id, delivery_status)
                .await?,
        )
    }
}
