//! Handlers for instance lifecycle and synchronization.
//!
//! Instances are registered here, paired via QR code, synced on demand,
//! and removed. Connection state lives in the database and is refreshed
//! from the gateway on request.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use zapgate_core::error::CoreError;
use zapgate_core::types::DbId;
use zapgate_db::models::instance::CreateInstance;
use zapgate_db::repositories::InstanceRepo;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// Query parameters for fetching a single instance.
#[derive(Deserialize)]
pub struct ShowInstanceParams {
    /// When true, poll the gateway for live connection state before
    /// returning the row.
    #[serde(default)]
    pub refresh: bool,
}

// ---------------------------------------------------------------------------
// CRUD
// ---------------------------------------------------------------------------

/// POST /api/v1/instances
///
/// Register a new instance: creates the gateway session first, then the
/// local row. Duplicate names are rejected with 409.
pub async fn create_instance(
    State(state): State<AppState>,
    Json(input): Json<CreateInstance>,
) -> AppResult<impl IntoResponse> {
    let instance = state.engine.register_instance(&input.name).await?;

    tracing::info!(instance_id = instance.id, name = %instance.name, "Instance registered");

    Ok((StatusCode::CREATED, Json(DataResponse { data: instance })))
}

/// GET /api/v1/instances
///
/// List all instances, newest first.
pub async fn list_instances(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let instances = InstanceRepo::list(&state.pool).await?;

    Ok(Json(DataResponse { data: instances }))
}

/// GET /api/v1/instances/{id}
///
/// Fetch one instance. With `?refresh=true` the gateway is polled first
/// and the stored connection state updated before the row is returned.
pub async fn get_instance(
    State(state): State<AppState>,
    Path(instance_id): Path<DbId>,
    Query(params): Query<ShowInstanceParams>,
) -> AppResult<impl IntoResponse> {
    if params.refresh {
        state.engine.refresh_connection_state(instance_id).await?;
    }

    let instance = InstanceRepo::find_by_id(&state.pool, instance_id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "Instance",
            id: instance_id,
        })?;

    Ok(Json(DataResponse { data: instance }))
}

/// DELETE /api/v1/instances/{id}
///
/// Remove an instance: gateway session first (best effort), then the
/// local row. Any live event subscribers for the instance are dropped.
pub async fn delete_instance(
    State(state): State<AppState>,
    Path(instance_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    state.engine.remove_instance(instance_id).await?;
    state.event_bus.remove(instance_id);

    tracing::info!(instance_id, "Instance removed");

    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Pairing and sync
// ---------------------------------------------------------------------------

/// POST /api/v1/instances/{id}/connect
///
/// Start pairing: asks the gateway for a QR code / pairing code and
/// stores it so reconnecting clients can re-render it.
pub async fn connect_instance(
    State(state): State<AppState>,
    Path(instance_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let artifact = state.engine.start_pairing(instance_id).await?;

    Ok(Json(DataResponse { data: artifact }))
}

/// POST /api/v1/instances/{id}/sync
///
/// Trigger a manual full sync. Rate limited per instance; a denied
/// request gets 429 with a retry-after hint.
pub async fn sync_instance(
    State(state): State<AppState>,
    Path(instance_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let report = state.engine.reconcile(instance_id).await?;

    tracing::info!(
        instance_id,
        created = report.created,
        updated = report.updated,
        "Manual sync finished"
    );

    Ok(Json(DataResponse { data: report }))
}

/// POST /api/v1/instances/{id}/recreate
///
/// Rebuild the gateway session for an orphaned instance under a fresh
/// provider id. Refused with 409 unless the instance is orphaned.
pub async fn recreate_instance(
    State(state): State<AppState>,
    Path(instance_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let instance = state.engine.recreate_instance(instance_id).await?;

    tracing::info!(
        instance_id,
        provider_instance_id = %instance.provider_instance_id,
        "Instance recreated"
    );

    Ok(Json(DataResponse { data: instance }))
}
