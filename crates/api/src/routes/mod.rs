pub mod admin;
pub mod health;
pub mod instances;
pub mod webhook;

use axum::Router;

use crate::state::AppState;

/// Routes mounted under `/api/v1`.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(instances::router())
        .merge(admin::router())
        .merge(crate::ws::router())
}
