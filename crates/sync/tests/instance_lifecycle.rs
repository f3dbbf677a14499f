//! Instance registration, pairing and removal.

mod common;

use assert_matches::assert_matches;
use common::{instance, test_engine, MemoryStore, MockGateway};
use std::sync::Arc;
use zapgate_core::error::CoreError;
use zapgate_events::names;

// ---------------------------------------------------------------------------
// Test: registration
// ---------------------------------------------------------------------------

#[tokio::test]
async fn register_creates_session_then_row() {
    let store = Arc::new(MemoryStore::default());
    let gateway = MockGateway::with_chats(vec![]);
    let (engine, _) = test_engine(store.clone(), gateway.clone());

    let row = engine.register_instance("  My Shop  ").await.expect("register");

    assert_eq!(row.name, "My Shop");
    assert_eq!(row.status, "disconnected");
    assert!(row.provider_instance_id.starts_with("my_shop_"));

    let created = gateway.created.lock().unwrap();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].0, row.provider_instance_id);
    assert!(created[0]
        .1
        .ends_with(&format!("/webhook/{}", row.provider_instance_id)));
}

#[tokio::test]
async fn register_rejects_empty_name_without_touching_the_gateway() {
    let store = Arc::new(MemoryStore::default());
    let gateway = MockGateway::with_chats(vec![]);
    let (engine, _) = test_engine(store, gateway.clone());

    assert_matches!(
        engine.register_instance("   ").await,
        Err(CoreError::Validation(_))
    );
    assert!(gateway.created.lock().unwrap().is_empty());
}

#[tokio::test]
async fn register_cleans_up_the_session_when_the_row_insert_fails() {
    let store = MemoryStore::with_instance(instance(1, "shop", "shop_abc", "connected"));
    let gateway = MockGateway::with_chats(vec![]);
    let (engine, _) = test_engine(store, gateway.clone());

    // Same display name as the existing row: the insert fails and the
    // just-created gateway session is torn down again.
    assert!(engine.register_instance("shop").await.is_err());
    assert_eq!(gateway.created.lock().unwrap().len(), 1);
    assert_eq!(gateway.deleted.lock().unwrap().len(), 1);
}

// ---------------------------------------------------------------------------
// Test: pairing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn start_pairing_stores_artifact_and_broadcasts() {
    let store = MemoryStore::with_instance(instance(1, "shop", "shop_abc", "disconnected"));
    let gateway = MockGateway::with_chats(vec![]);
    let (engine, broadcaster) = test_engine(store.clone(), gateway);

    let artifact = engine.start_pairing(1).await.expect("pairing");

    assert_eq!(artifact.base64.as_deref(), Some("data:image/png;base64,TESTQR"));
    let row = store.instance(1);
    assert_eq!(row.status, "connecting");
    assert_eq!(row.pairing_code(), Some("data:image/png;base64,TESTQR"));
    assert_eq!(broadcaster.count(names::QRCODE_UPDATED), 1);
}

#[tokio::test]
async fn start_pairing_refuses_orphaned_instances() {
    let mut row = instance(1, "shop", "shop_abc", "error");
    row.settings = serde_json::json!({ "orphaned": true });
    let store = MemoryStore::with_instance(row);
    let gateway = MockGateway::with_chats(vec![]);
    let (engine, _) = test_engine(store, gateway);

    assert_matches!(
        engine.start_pairing(1).await,
        Err(CoreError::Orphaned { id: 1 })
    );
}

// ---------------------------------------------------------------------------
// Test: removal
// ---------------------------------------------------------------------------

#[tokio::test]
async fn remove_deletes_row_and_gateway_session() {
    let store = MemoryStore::with_instance(instance(1, "shop", "shop_abc", "connected"));
    let gateway = MockGateway::with_chats(vec![]);
    let (engine, _) = test_engine(store.clone(), gateway.clone());

    engine.remove_instance(1).await.expect("remove");

    assert!(engine.reconcile(1).await.is_err(), "row must be gone");
    assert_eq!(*gateway.deleted.lock().unwrap(), vec!["shop_abc".to_string()]);
}

#[tokio::test]
async fn remove_unknown_instance_is_not_found() {
    let store = Arc::new(MemoryStore::default());
    let gateway = MockGateway::with_chats(vec![]);
    let (engine, _) = test_engine(store, gateway);

    assert_matches!(
        engine.remove_instance(9).await,
        Err(CoreError::NotFound { entity: "Instance", id: 9 })
    );
}
