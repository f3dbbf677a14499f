/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development except the
/// gateway credentials, which must be set.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Base URL of the WhatsApp gateway (Evolution-compatible API).
    pub provider_url: String,
    /// API key sent as the `apikey` header on gateway requests.
    pub provider_api_key: String,
    /// Public base URL of this backend, used when registering webhook
    /// targets with the gateway.
    pub webhook_base_url: String,
    /// Redis connection URL. When unset, rate limiting falls back to a
    /// process-local counter and progress snapshots are not shared
    /// across replicas.
    pub redis_url: Option<String>,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `HOST`                 | `0.0.0.0`                  |
    /// | `PORT`                 | `3000`                     |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                       |
    /// | `PROVIDER_URL`         | `http://localhost:8080`    |
    /// | `PROVIDER_API_KEY`     | (required)                 |
    /// | `WEBHOOK_BASE_URL`     | `http://localhost:3000`    |
    /// | `REDIS_URL`            | (unset)                    |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let provider_url =
            std::env::var("PROVIDER_URL").unwrap_or_else(|_| "http://localhost:8080".into());
        let provider_api_key =
            std::env::var("PROVIDER_API_KEY").expect("PROVIDER_API_KEY must be set");

        let webhook_base_url =
            std::env::var("WEBHOOK_BASE_URL").unwrap_or_else(|_| "http://localhost:3000".into());

        let redis_url = std::env::var("REDIS_URL").ok();

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            provider_url,
            provider_api_key,
            webhook_base_url,
            redis_url,
        }
    }
}
