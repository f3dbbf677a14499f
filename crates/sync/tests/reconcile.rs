//! Reconciliation scenarios against in-memory doubles.
//!
//! Covers the full-sync happy path, idempotent re-runs, batching and
//! progress fan-out, partial failures, rate limiting and the failure
//! modes around the gateway.

mod common;

use assert_matches::assert_matches;
use common::{instance, remote_chat, test_engine, MemoryStore, MockGateway};
use serde_json::json;
use std::sync::atomic::Ordering;
use zapgate_core::error::CoreError;
use zapgate_core::webhook::WebhookEnvelope;
use zapgate_events::names;
use zapgate_events::progress::{PROGRESS_CEILING, PROGRESS_FLOOR};

// ---------------------------------------------------------------------------
// Test: full sync creates contacts and chats
// ---------------------------------------------------------------------------

#[tokio::test]
async fn full_sync_creates_contacts_and_chats() {
    let store = MemoryStore::with_instance(instance(1, "shop", "shop_abc", "connected"));
    let gateway = MockGateway::with_chats(vec![
        remote_chat("5511999990001", "Alice", Some("hi")),
        remote_chat("5511999990002", "Bob", None),
    ]);
    let (engine, broadcaster) = test_engine(store.clone(), gateway);

    let report = engine.reconcile(1).await.expect("sync should succeed");

    assert_eq!(report.created, 2);
    assert_eq!(report.updated, 0);
    assert_eq!(report.total, 2);
    assert!(report.failures.is_empty());

    assert_eq!(store.contacts().len(), 2);
    let chats = store.chats();
    assert_eq!(chats.len(), 2);
    let alice = chats
        .iter()
        .find(|c| c.chat_id == "5511999990001@s.whatsapp.net")
        .expect("alice chat");
    assert_eq!(alice.last_message.as_deref(), Some("hi"));
    assert_eq!(alice.last_message_type.as_deref(), Some("text"));

    // The instance's last-seen marker moved.
    assert!(store.instance(1).last_seen_at.is_some());

    assert_eq!(broadcaster.count(names::SYNC_START), 1);
    assert_eq!(broadcaster.count(names::SYNC_COMPLETE), 1);
    let complete = &broadcaster.payloads(names::SYNC_COMPLETE)[0];
    assert_eq!(complete["status"], "completed");
    assert_eq!(complete["progress"], 100);
    assert_eq!(complete["type"], "manual");
}

// ---------------------------------------------------------------------------
// Test: a second run over the same data updates instead of creating
// ---------------------------------------------------------------------------

#[tokio::test]
async fn second_run_is_idempotent() {
    let store = MemoryStore::with_instance(instance(1, "shop", "shop_abc", "connected"));
    let gateway = MockGateway::with_chats(vec![
        remote_chat("5511999990001", "Alice", Some("hi")),
        remote_chat("5511999990002", "Bob", Some("yo")),
    ]);
    let (engine, _) = test_engine(store.clone(), gateway);

    let first = engine.reconcile(1).await.expect("first run");
    assert_eq!(first.created, 2);

    let second = engine.reconcile(1).await.expect("second run");
    assert_eq!(second.created, 0);
    assert_eq!(second.updated, 2);

    // No duplicate rows appeared.
    assert_eq!(store.contacts().len(), 2);
    assert_eq!(store.chats().len(), 2);
}

// ---------------------------------------------------------------------------
// Test: batching emits monotonic progress in the reserved range
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sixty_chats_progress_in_three_batches() {
    let chats = (0..60)
        .map(|n| remote_chat(&format!("55119999{n:05}"), &format!("c{n}"), None))
        .collect();
    let store = MemoryStore::with_instance(instance(1, "shop", "shop_abc", "connected"));
    let gateway = MockGateway::with_chats(chats);
    let (engine, broadcaster) = test_engine(store, gateway);

    let report = engine.reconcile(1).await.expect("sync");
    assert_eq!(report.created, 60);

    // Default batch size 25: batches of 25, 25 and 10.
    let progress = broadcaster.payloads(names::SYNC_PROGRESS);
    assert_eq!(progress.len(), 3);

    let mut last = 0;
    for payload in &progress {
        let p = payload["progress"].as_u64().expect("progress field") as u8;
        assert!((PROGRESS_FLOOR..=PROGRESS_CEILING).contains(&p));
        assert!(p >= last, "progress went backward");
        last = p;
    }
    assert_eq!(last, PROGRESS_CEILING);
}

// ---------------------------------------------------------------------------
// Test: zero eligible chats still completes cleanly
// ---------------------------------------------------------------------------

#[tokio::test]
async fn empty_chat_list_completes_with_empty_report() {
    let store = MemoryStore::with_instance(instance(1, "shop", "shop_abc", "connected"));
    let gateway = MockGateway::with_chats(vec![]);
    let (engine, broadcaster) = test_engine(store, gateway);

    let report = engine.reconcile(1).await.expect("sync");
    assert_eq!(report.total, 0);
    assert_eq!(report.created, 0);

    assert_eq!(broadcaster.count(names::SYNC_PROGRESS), 0);
    assert_eq!(
        broadcaster.payloads(names::SYNC_COMPLETE)[0]["status"],
        "completed"
    );
}

// ---------------------------------------------------------------------------
// Test: broadcast pseudo-chats are filtered out
// ---------------------------------------------------------------------------

#[tokio::test]
async fn broadcast_chats_are_skipped() {
    let mut broadcast_entry = remote_chat("0", "status", None);
    broadcast_entry.id = "status@broadcast".to_string();

    let store = MemoryStore::with_instance(instance(1, "shop", "shop_abc", "connected"));
    let gateway = MockGateway::with_chats(vec![
        broadcast_entry,
        remote_chat("5511999990001", "Alice", None),
    ]);
    let (engine, _) = test_engine(store.clone(), gateway);

    let report = engine.reconcile(1).await.expect("sync");
    assert_eq!(report.total, 1);
    assert_eq!(store.chats().len(), 1);
}

// ---------------------------------------------------------------------------
// Test: one bad entry does not sink the run
// ---------------------------------------------------------------------------

#[tokio::test]
async fn partial_failure_is_reported_not_fatal() {
    let store = MemoryStore::with_instance(instance(1, "shop", "shop_abc", "connected"));
    store.fail_contact("5511999990002");
    let gateway = MockGateway::with_chats(vec![
        remote_chat("5511999990001", "Alice", None),
        remote_chat("5511999990002", "Bob", None),
        remote_chat("5511999990003", "Carol", None),
    ]);
    let (engine, broadcaster) = test_engine(store.clone(), gateway);

    let report = engine.reconcile(1).await.expect("run should still complete");

    assert_eq!(report.created, 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].chat_jid, "5511999990002@s.whatsapp.net");
    assert_eq!(store.chats().len(), 2);
    assert_eq!(
        broadcaster.payloads(names::SYNC_COMPLETE)[0]["status"],
        "completed"
    );
}

// ---------------------------------------------------------------------------
// Test: a sync pass and a webhook writing the same phone converge on one row
// ---------------------------------------------------------------------------

#[tokio::test]
async fn concurrent_sync_and_webhook_share_one_contact() {
    let store = MemoryStore::with_instance(instance(1, "shop", "shop_abc", "connected"));
    let gateway =
        MockGateway::with_chats(vec![remote_chat("5511999990001", "Alice", Some("hi"))]);
    let (engine, _) = test_engine(store.clone(), gateway);

    let inbound = WebhookEnvelope {
        event: "MESSAGES_UPSERT".to_string(),
        data: json!({
            "key": {
                "remoteJid": "5511999990001@s.whatsapp.net",
                "fromMe": false,
                "id": "MSG-1",
            },
            "pushName": "Ali",
            "message": { "conversation": "hello" },
            "messageTimestamp": 1_725_000_100,
        }),
    };

    let (report, ()) = tokio::join!(
        engine.reconcile(1),
        engine.handle_webhook("shop_abc", inbound),
    );
    report.expect("sync should succeed");

    // Both paths targeted the same phone; the upsert contract must
    // leave a single contact and a single chat behind.
    let contacts = store.contacts();
    assert_eq!(
        contacts
            .iter()
            .filter(|c| c.instance_id == 1 && c.phone == "5511999990001")
            .count(),
        1
    );
    assert_eq!(store.chats().len(), 1);
    assert_eq!(store.messages().len(), 1);
}

// ---------------------------------------------------------------------------
// Test: manual rate limit
// ---------------------------------------------------------------------------

#[tokio::test]
async fn manual_syncs_beyond_the_limit_are_rejected() {
    let store = MemoryStore::with_instance(instance(1, "shop", "shop_abc", "connected"));
    let gateway = MockGateway::with_chats(vec![]);
    let (engine, _) = test_engine(store, gateway);

    // Default interactive limit is 5 per window.
    for _ in 0..5 {
        engine.reconcile(1).await.expect("within the limit");
    }
    assert_matches!(
        engine.reconcile(1).await,
        Err(CoreError::RateLimited { retry_after_secs }) if retry_after_secs > 0
    );
}

// ---------------------------------------------------------------------------
// Test: failure modes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn missing_gateway_session_orphans_the_instance() {
    let store = MemoryStore::with_instance(instance(1, "shop", "shop_abc", "connected"));
    let gateway = MockGateway::with_chats(vec![]);
    gateway.session_gone.store(true, Ordering::SeqCst);
    let (engine, broadcaster) = test_engine(store.clone(), gateway);

    assert_matches!(engine.reconcile(1).await, Err(CoreError::Orphaned { id: 1 }));

    let row = store.instance(1);
    assert!(row.is_orphaned());
    assert_eq!(row.status, "error");
    assert_eq!(
        broadcaster.payloads(names::SYNC_COMPLETE)[0]["status"],
        "error"
    );
}

#[tokio::test]
async fn gateway_outage_surfaces_as_unavailable() {
    let store = MemoryStore::with_instance(instance(1, "shop", "shop_abc", "connected"));
    let gateway = MockGateway::with_chats(vec![]);
    gateway.fetch_unavailable.store(true, Ordering::SeqCst);
    let (engine, broadcaster) = test_engine(store.clone(), gateway);

    assert_matches!(
        engine.reconcile(1).await,
        Err(CoreError::ProviderUnavailable(_))
    );
    // The instance is not orphaned by a transient outage.
    assert!(!store.instance(1).is_orphaned());
    assert_eq!(
        broadcaster.payloads(names::SYNC_COMPLETE)[0]["status"],
        "error"
    );
}

#[tokio::test]
async fn disconnected_instance_refuses_to_sync() {
    let store = MemoryStore::with_instance(instance(1, "shop", "shop_abc", "disconnected"));
    let gateway = MockGateway::with_chats(vec![]);
    let (engine, _) = test_engine(store, gateway);

    assert_matches!(engine.reconcile(1).await, Err(CoreError::InvalidState(_)));
}

#[tokio::test]
async fn unknown_instance_is_not_found() {
    let store = MemoryStore::with_instance(instance(1, "shop", "shop_abc", "connected"));
    let gateway = MockGateway::with_chats(vec![]);
    let (engine, _) = test_engine(store, gateway);

    assert_matches!(
        engine.reconcile(42).await,
        Err(CoreError::NotFound { entity: "Instance", id: 42 })
    );
}
