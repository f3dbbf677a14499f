//! Integration tests for the gateway webhook ingress.
//!
//! The contract is unconditional acknowledgement: the gateway must
//! never see an error from this endpoint, whatever the payload.

mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use common::{body_json, post_json, StubGateway};
use sqlx::PgPool;
use zapgate_db::repositories::InstanceRepo;

// ---------------------------------------------------------------------------
// Acknowledgement
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn unknown_instance_is_still_acknowledged(pool: PgPool) {
    let app = common::build_test_app(pool, Arc::new(StubGateway::default()));

    let response = post_json(
        app,
        "/webhook/no_such_instance",
        serde_json::json!({ "event": "messages.upsert", "data": {} }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["success"], true);
}

// ---------------------------------------------------------------------------
// Connection updates flow through to the stored row
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn connection_update_persists_the_new_status(pool: PgPool) {
    let app = common::build_test_app(pool.clone(), Arc::new(StubGateway::default()));

    let response = post_json(
        app.clone(),
        "/api/v1/instances",
        serde_json::json!({ "name": "Shop" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let row = body_json(response).await["data"].clone();
    let id = row["id"].as_i64().expect("id");
    let provider_id = row["provider_instance_id"]
        .as_str()
        .expect("provider id")
        .to_string();

    let response = post_json(
        app,
        &format!("/webhook/{provider_id}"),
        serde_json::json!({
            "event": "CONNECTION_UPDATE",
            "data": { "state": "open" }
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let instance = InstanceRepo::find_by_id(&pool, id)
        .await
        .expect("query")
        .expect("row");
    assert_eq!(instance.status, "connected");
}
