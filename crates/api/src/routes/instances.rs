//! Route definitions for instance management, mounted at `/instances`.
//!
//! ```text
//! POST   /                   create_instance
//! GET    /                   list_instances
//! GET    /{id}               get_instance (?refresh=true polls the gateway)
//! DELETE /{id}               delete_instance
//! POST   /{id}/connect       connect_instance (pairing)
//! POST   /{id}/sync          sync_instance (manual full sync)
//! POST   /{id}/recreate      recreate_instance (orphan recovery)
//! ```

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::instances;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/instances",
            get(instances::list_instances).post(instances::create_instance),
        )
        .route(
            "/instances/{id}",
            get(instances::get_instance).delete(instances::delete_instance),
        )
        .route("/instances/{id}/connect", post(instances::connect_instance))
        .route("/instances/{id}/sync", post(instances::sync_instance))
        .route(
            "/instances/{id}/recreate",
            post(instances::recreate_instance),
        )
}
