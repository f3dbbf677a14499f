//! Route definitions for operator endpoints, mounted at `/admin`.
//!
//! ```text
//! GET    /admin/orphans      scan_orphans (?delete=true removes strays)
//! ```

use axum::routing::get;
use axum::Router;

use crate::handlers::admin;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/admin/orphans", get(admin::scan_orphans))
}
