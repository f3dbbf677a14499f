//! Gateway webhook ingress.
//!
//! The gateway posts every event here with the provider-side instance id
//! in the path. The handler always acknowledges with 200 so the gateway
//! never retries or disables the webhook; failures are logged and
//! absorbed inside the engine.

use axum::extract::{Path, State};
use axum::{routing::post, Json, Router};
use serde_json::{json, Value};

use zapgate_core::webhook::WebhookEnvelope;

use crate::state::AppState;

/// POST /webhook/{provider_instance_id} -- ingest one gateway event.
async fn receive_webhook(
    State(state): State<AppState>,
    Path(provider_instance_id): Path<String>,
    Json(envelope): Json<WebhookEnvelope>,
) -> Json<Value> {
    state
        .engine
        .handle_webhook(&provider_instance_id, envelope)
        .await;

    Json(json!({ "success": true }))
}

/// Mount webhook routes (root-level, NOT under `/api/v1`).
pub fn router() -> Router<AppState> {
    Router::new().route("/webhook/{provider_instance_id}", post(receive_webhook))
}
