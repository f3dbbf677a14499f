/// Errors from the gateway REST API layer.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The gateway has no session for the requested instance.
    /// This is the orphan signal: the local row still exists but its
    /// gateway-side backing resource is gone.
    #[error("Gateway instance not found: {0}")]
    NotFound(String),

    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("Gateway request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The gateway returned a non-2xx status code other than 404.
    #[error("Gateway API error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },
}

impl ProviderError {
    /// True when the error indicates a missing gateway-side resource.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ProviderError::NotFound(_))
    }
}
