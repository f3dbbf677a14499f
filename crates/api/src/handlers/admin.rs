//! Operator endpoints for fleet maintenance.

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// Query parameters for the orphan scan.
#[derive(Deserialize)]
pub struct OrphanScanParams {
    /// When true, delete stray gateway sessions that have no local row.
    #[serde(default)]
    pub delete: bool,
}

/// GET /api/v1/admin/orphans
///
/// Compare the local fleet against the gateway's session list. Local
/// instances whose session vanished are flagged as orphaned; gateway
/// sessions with no local row are reported (and deleted with
/// `?delete=true`).
pub async fn scan_orphans(
    State(state): State<AppState>,
    Query(params): Query<OrphanScanParams>,
) -> AppResult<impl IntoResponse> {
    let report = state.engine.scan_fleet(params.delete).await?;

    tracing::info!(
        orphaned = report.orphaned.len(),
        strays = report.strays.len(),
        deleted = report.deleted.len(),
        "Fleet scan finished"
    );

    Ok(Json(DataResponse { data: report }))
}
