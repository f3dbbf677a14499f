//! In-memory doubles for the sync engine's capability traits.
//!
//! [`MemoryStore`] honors the same contracts as the PostgreSQL store
//! (natural-key uniqueness, `(row, created)` upsert results, `None`
//! fields leave stored values untouched) so engine tests exercise real
//! idempotency behavior without a database.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use zapgate_cache::progress::ProgressStore;
use zapgate_cache::rate_limit::{MemoryCounter, RateLimiter};
use zapgate_cache::response::ResponseCache;
use zapgate_core::types::{DbId, Timestamp};
use zapgate_db::models::chat::{Chat, ChatSnapshot};
use zapgate_db::models::contact::{Contact, ContactUpsert};
use zapgate_db::models::instance::Instance;
use zapgate_db::models::message::{Message, NewMessage};
use zapgate_events::Broadcaster;
use zapgate_provider::types::{
    CreatedInstance, InstanceInfo, PairingInfo, RemoteChat,
};
use zapgate_provider::ProviderError;
use zapgate_sync::store::SyncStore;
use zapgate_sync::gateway::Gateway;
use zapgate_sync::{EngineConfig, SyncEngine};

fn now() -> Timestamp {
    chrono::Utc::now()
}

/// Build an instance row for tests.
pub fn instance(id: DbId, name: &str, provider_id: &str, status: &str) -> Instance {
    Instance {
        id,
        name: name.to_string(),
        provider_instance_id: provider_id.to_string(),
        status: status.to_string(),
        phone_number: None,
        last_seen_at: None,
        settings: serde_json::json!({}),
        created_at: now(),
        updated_at: now(),
    }
}

/// Build a remote chat entry for a direct conversation.
pub fn remote_chat(phone: &str, name: &str, text: Option<&str>) -> RemoteChat {
    RemoteChat {
        id: format!("{phone}@s.whatsapp.net"),
        name: Some(name.to_string()),
        push_name: None,
        last_message: text.map(|t| serde_json::json!({"message": {"conversation": t}})),
        conversation_timestamp: Some(1_725_000_000),
        extra: serde_json::json!({}),
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

#[derive(Default)]
struct StoreData {
    next_id: DbId,
    instances: HashMap<DbId, Instance>,
    contacts: Vec<Contact>,
    chats: Vec<Chat>,
    messages: Vec<Message>,
}

/// In-memory [`SyncStore`] honoring the uniqueness contracts.
#[derive(Default)]
pub struct MemoryStore {
    data: Mutex<StoreData>,
    /// Contact phones whose upsert fails, for partial-failure tests.
    failing_contacts: Mutex<HashSet<String>>,
}

impl MemoryStore {
    pub fn with_instance(instance: Instance) -> Arc<Self> {
        let store = Self::default();
        {
            let mut data = store.data.lock().unwrap();
            data.next_id = 1000;
            data.instances.insert(instance.id, instance);
        }
        Arc::new(store)
    }

    pub fn fail_contact(&self, phone: &str) {
        self.failing_contacts.lock().unwrap().insert(phone.to_string());
    }

    pub fn instance(&self, id: DbId) -> Instance {
        self.data.lock().unwrap().instances[&id].clone()
    }

    pub fn contacts(&self) -> Vec<Contact> {
        self.data.lock().unwrap().contacts.clone()
    }

    pub fn chats(&self) -> Vec<Chat> {
        self.data.lock().unwrap().chats.clone()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.data.lock().unwrap().messages.clone()
    }

    fn alloc_id(data: &mut StoreData) -> DbId {
        data.next_id += 1;
        data.next_id
    }
}

fn apply_contact_fields(contact: &mut Contact, fields: &ContactUpsert) {
    if let Some(name) = &fields.name {
        contact.name = Some(name.clone());
    }
    if let Some(push_name) = &fields.push_name {
        contact.push_name = Some(push_name.clone());
    }
    if let Some(avatar_url) = &fields.avatar_url {
        contact.avatar_url = Some(avatar_url.clone());
    }
    if let Some(is_group) = fields.is_group {
        contact.is_group = is_group;
    }
    if let Some(meta) = &fields.group_metadata {
        contact.group_metadata = Some(meta.clone());
    }
    contact.updated_at = now();
}

fn apply_snapshot(chat: &mut Chat, snapshot: &ChatSnapshot) {
    if let Some(v) = &snapshot.last_message {
        chat.last_message = Some(v.clone());
    }
    if let Some(v) = &snapshot.last_message_type {
        chat.last_message_type = Some(v.clone());
    }
    if let Some(v) = &snapshot.last_message_sender {
        chat.last_message_sender = Some(v.clone());
    }
    if let Some(v) = snapshot.last_message_at {
        chat.last_message_at = Some(v);
    }
    chat.updated_at = now();
}

#[async_trait]
impl SyncStore for MemoryStore {
    async fn create_instance(
        &self,
        name: &str,
        provider_instance_id: &str,
    ) -> anyhow::Result<Instance> {
        let mut data = self.data.lock().unwrap();
        if data.instances.values().any(|i| i.name == name) {
            anyhow::bail!("duplicate instance name {name}");
        }
        let id = Self::alloc_id(&mut data);
        let row = instance(id, name, provider_instance_id, "disconnected");
        data.instances.insert(id, row.clone());
        Ok(row)
    }

    async fn delete_instance(&self, id: DbId) -> anyhow::Result<bool> {
        Ok(self.data.lock().unwrap().instances.remove(&id).is_some())
    }

    async fn find_instance(&self, id: DbId) -> anyhow::Result<Option<Instance>> {
        Ok(self.data.lock().unwrap().instances.get(&id).cloned())
    }

    async fn find_instance_by_provider_id(
        &self,
        provider_instance_id: &str,
    ) -> anyhow::Result<Option<Instance>> {
        Ok(self
            .data
            .lock()
            .unwrap()
            .instances
            .values()
            .find(|i| i.provider_instance_id == provider_instance_id)
            .cloned())
    }

    async fn list_instances(&self) -> anyhow::Result<Vec<Instance>> {
        let mut instances: Vec<Instance> =
            self.data.lock().unwrap().instances.values().cloned().collect();
        instances.sort_by_key(|i| i.id);
        Ok(instances)
    }

    async fn update_instance_status(&self, id: DbId, status: &str) -> anyhow::Result<()> {
        let mut data = self.data.lock().unwrap();
        let instance = data
            .instances
            .get_mut(&id)
            .ok_or_else(|| anyhow::anyhow!("no instance {id}"))?;
        instance.status = status.to_string();
        instance.updated_at = now();
        Ok(())
    }

    async fn update_instance_phone(&self, id: DbId, phone_number: &str) -> anyhow::Result<()> {
        let mut data = self.data.lock().unwrap();
        let instance = data
            .instances
            .get_mut(&id)
            .ok_or_else(|| anyhow::anyhow!("no instance {id}"))?;
        instance.phone_number = Some(phone_number.to_string());
        Ok(())
    }

    async fn touch_instance_last_seen(&self, id: DbId) -> anyhow::Result<()> {
        let mut data = self.data.lock().unwrap();
        let instance = data
            .instances
            .get_mut(&id)
            .ok_or_else(|| anyhow::anyhow!("no instance {id}"))?;
        instance.last_seen_at = Some(now());
        Ok(())
    }

    async fn merge_instance_settings(&self, id: DbId, patch: &Value) -> anyhow::Result<()> {
        let mut data = self.data.lock().unwrap();
        let instance = data
            .instances
            .get_mut(&id)
            .ok_or_else(|| anyhow::anyhow!("no instance {id}"))?;
        // jsonb `||` merge: null values overwrite too, like Postgres.
        if let (Some(settings), Some(patch)) =
            (instance.settings.as_object_mut(), patch.as_object())
        {
            for (key, value) in patch {
                settings.insert(key.clone(), value.clone());
            }
        }
        Ok(())
    }

    async fn reset_instance_identity(
        &self,
        id: DbId,
        provider_instance_id: &str,
        status: &str,
    ) -> anyhow::Result<()> {
        let mut data = self.data.lock().unwrap();
        let instance = data
            .instances
            .get_mut(&id)
            .ok_or_else(|| anyhow::anyhow!("no instance {id}"))?;
        instance.provider_instance_id = provider_instance_id.to_string();
        instance.status = status.to_string();
        instance.phone_number = None;
        if let Some(settings) = instance.settings.as_object_mut() {
            for key in ["orphaned", "orphaned_at", "orphaned_reason", "pairing_code"] {
                settings.remove(key);
            }
        }
        Ok(())
    }

    async fn upsert_contact(
        &self,
        instance_id: DbId,
        phone: &str,
        fields: &ContactUpsert,
    ) -> anyhow::Result<(Contact, bool)> {
        if self.failing_contacts.lock().unwrap().contains(phone) {
            anyhow::bail!("injected contact failure for {phone}");
        }
        let mut data = self.data.lock().unwrap();
        if let Some(contact) = data
            .contacts
            .iter_mut()
            .find(|c| c.instance_id == instance_id && c.phone == phone)
        {
            apply_contact_fields(contact, fields);
            return Ok((contact.clone(), false));
        }
        let id = Self::alloc_id(&mut data);
        let mut contact = Contact {
            id,
            instance_id,
            phone: phone.to_string(),
            name: None,
            push_name: None,
            avatar_url: None,
            is_group: false,
            group_metadata: None,
            is_blocked: false,
            last_seen_at: None,
            created_at: now(),
            updated_at: now(),
        };
        apply_contact_fields(&mut contact, fields);
        data.contacts.push(contact.clone());
        Ok((contact, true))
    }

    async fn upsert_chat(
        &self,
        instance_id: DbId,
        contact_id: DbId,
        chat_id: &str,
        snapshot: &ChatSnapshot,
    ) -> anyhow::Result<(Chat, bool)> {
        let mut data = self.data.lock().unwrap();
        if let Some(chat) = data
            .chats
            .iter_mut()
            .find(|c| c.instance_id == instance_id && c.chat_id == chat_id)
        {
            chat.contact_id = contact_id;
            apply_snapshot(chat, snapshot);
            return Ok((chat.clone(), false));
        }
        let id = Self::alloc_id(&mut data);
        let mut chat = Chat {
            id,
            instance_id,
            contact_id,
            chat_id: chat_id.to_string(),
            last_message: None,
            last_message_type: None,
            last_message_sender: None,
            last_message_at: None,
            unread_count: 0,
            is_pinned: false,
            is_archived: false,
            is_muted: false,
            created_at: now(),
            updated_at: now(),
        };
        apply_snapshot(&mut chat, snapshot);
        data.chats.push(chat.clone());
        Ok((chat, true))
    }

    async fn record_chat_message(
        &self,
        chat_row_id: DbId,
        snapshot: &ChatSnapshot,
        increment_unread: bool,
    ) -> anyhow::Result<()> {
        let mut data = self.data.lock().unwrap();
        let chat = data
            .chats
            .iter_mut()
            .find(|c| c.id == chat_row_id)
            .ok_or_else(|| anyhow::anyhow!("no chat row {chat_row_id}"))?;
        apply_snapshot(chat, snapshot);
        if increment_unread {
            chat.unread_count += 1;
        }
        Ok(())
    }

    async fn insert_message_if_absent(
        &self,
        new: &NewMessage,
    ) -> anyhow::Result<(Message, bool)> {
        let mut data = self.data.lock().unwrap();
        if let Some(existing) = data
            .messages
            .iter()
            .find(|m| m.instance_id == new.instance_id && m.message_id == new.message_id)
        {
            return Ok((existing.clone(), false));
        }
        let id = Self::alloc_id(&mut data);
        let message = Message {
            id,
            instance_id: new.instance_id,
            chat_id: new.chat_id,
            contact_id: new.contact_id,
            message_id: new.message_id.clone(),
            from_me: new.from_me,
            message_type: new.message_type.clone(),
            content: new.content.clone(),
            media_url: new.media_url.clone(),
            message_timestamp: new.message_timestamp,
            delivery_status: new.delivery_status.clone(),
            is_deleted: false,
            created_at: now(),
        };
        data.messages.push(message.clone());
        Ok((message, true))
    }

    async fn update_message_status(
        &self,
        instance_id: DbId,
        message_id: &str,
        delivery_status: &str,
    ) -> anyhow::Result<bool> {
        let mut data = self.data.lock().unwrap();
        match data
            .messages
            .iter_mut()
            .find(|m| m.instance_id == instance_id && m.message_id == message_id)
        {
            Some(message) => {
                message.delivery_status = delivery_status.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

// ---------------------------------------------------------------------------
// MockGateway
// ---------------------------------------------------------------------------

/// Scriptable [`Gateway`]: canned responses plus call recording.
#[derive(Default)]
pub struct MockGateway {
    pub chats: Mutex<Vec<RemoteChat>>,
    /// Raw state returned from `connection_state`, keyed by name.
    pub states: Mutex<HashMap<String, Option<String>>>,
    pub remote_instances: Mutex<Vec<InstanceInfo>>,
    /// When set, instance-scoped calls fail with `NotFound`.
    pub session_gone: AtomicBool,
    /// When set, `fetch_chats` fails with a 502.
    pub fetch_unavailable: AtomicBool,
    pub created: Mutex<Vec<(String, String)>>,
    pub deleted: Mutex<Vec<String>>,
    pub fetch_count: Mutex<usize>,
}

impl MockGateway {
    pub fn with_chats(chats: Vec<RemoteChat>) -> Arc<Self> {
        let gateway = Self::default();
        *gateway.chats.lock().unwrap() = chats;
        Arc::new(gateway)
    }

    pub fn set_state(&self, name: &str, state: Option<&str>) {
        self.states
            .lock()
            .unwrap()
            .insert(name.to_string(), state.map(String::from));
    }
}

#[async_trait]
impl Gateway for MockGateway {
    async fn connection_state(
        &self,
        instance_name: &str,
    ) -> Result<Option<String>, ProviderError> {
        if self.session_gone.load(Ordering::SeqCst) {
            return Err(ProviderError::NotFound(instance_name.to_string()));
        }
        Ok(self
            .states
            .lock()
            .unwrap()
            .get(instance_name)
            .cloned()
            .flatten())
    }

    async fn instance_info(
        &self,
        instance_name: &str,
    ) -> Result<Option<InstanceInfo>, ProviderError> {
        Ok(self
            .remote_instances
            .lock()
            .unwrap()
            .iter()
            .find(|i| i.instance_name == instance_name)
            .cloned())
    }

    async fn fetch_chats(&self, instance_name: &str) -> Result<Vec<RemoteChat>, ProviderError> {
        *self.fetch_count.lock().unwrap() += 1;
        if self.session_gone.load(Ordering::SeqCst) {
            return Err(ProviderError::NotFound(instance_name.to_string()));
        }
        if self.fetch_unavailable.load(Ordering::SeqCst) {
            return Err(ProviderError::Api {
                status: 502,
                body: "bad gateway".to_string(),
            });
        }
        Ok(self.chats.lock().unwrap().clone())
    }

    async fn fetch_instances(&self) -> Result<Vec<InstanceInfo>, ProviderError> {
        Ok(self.remote_instances.lock().unwrap().clone())
    }

    async fn create_instance(
        &self,
        instance_name: &str,
        webhook_url: &str,
    ) -> Result<CreatedInstance, ProviderError> {
        self.created
            .lock()
            .unwrap()
            .push((instance_name.to_string(), webhook_url.to_string()));
        Ok(CreatedInstance {
            instance_name: instance_name.to_string(),
            qrcode: None,
        })
    }

    async fn delete_instance(&self, instance_name: &str) -> Result<(), ProviderError> {
        self.deleted.lock().unwrap().push(instance_name.to_string());
        Ok(())
    }

    async fn connect_instance(&self, _instance_name: &str) -> Result<PairingInfo, ProviderError> {
        Ok(PairingInfo {
            base64: Some("data:image/png;base64,TESTQR".to_string()),
            pairing_code: None,
        })
    }

    async fn set_webhook(
        &self,
        _instance_name: &str,
        _webhook_url: &str,
    ) -> Result<(), ProviderError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// RecordingBroadcaster
// ---------------------------------------------------------------------------

/// Captures everything published so tests can assert on fan-out.
#[derive(Default)]
pub struct RecordingBroadcaster {
    events: Mutex<Vec<(DbId, String, Value)>>,
}

impl RecordingBroadcaster {
    pub fn payloads(&self, event: &str) -> Vec<Value> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, name, _)| name == event)
            .map(|(_, _, payload)| payload.clone())
            .collect()
    }

    pub fn count(&self, event: &str) -> usize {
        self.payloads(event).len()
    }
}

impl Broadcaster for RecordingBroadcaster {
    fn publish(&self, instance_id: DbId, event: &str, payload: Value) {
        self.events
            .lock()
            .unwrap()
            .push((instance_id, event.to_string(), payload));
    }
}

// ---------------------------------------------------------------------------
// Engine builder
// ---------------------------------------------------------------------------

/// Build an engine over the doubles with test-friendly tunables
/// (no batch pause, no settle delay).
pub fn test_engine(
    store: Arc<MemoryStore>,
    gateway: Arc<MockGateway>,
) -> (SyncEngine, Arc<RecordingBroadcaster>) {
    test_engine_with_config(store, gateway, EngineConfig {
        batch_pause: Duration::ZERO,
        autosync_settle_delay: Duration::ZERO,
        ..EngineConfig::default()
    })
}

pub fn test_engine_with_config(
    store: Arc<MemoryStore>,
    gateway: Arc<MockGateway>,
    config: EngineConfig,
) -> (SyncEngine, Arc<RecordingBroadcaster>) {
    let broadcaster = Arc::new(RecordingBroadcaster::default());
    let engine = SyncEngine::new(
        store,
        gateway,
        broadcaster.clone(),
        RateLimiter::new(Arc::new(MemoryCounter::default())),
        ProgressStore::disabled(),
        ResponseCache::disabled(),
        config,
    );
    (engine, broadcaster)
}
