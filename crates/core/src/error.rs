use crate::types::DbId;

/// Domain error taxonomy shared by the sync engine and the API layer.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Gateway unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Instance {id} is orphaned: its gateway-side session no longer exists")]
    Orphaned { id: DbId },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
