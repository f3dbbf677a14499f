use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use zapgate_api::config::ServerConfig;
use zapgate_api::router::build_app_router;
use zapgate_api::state::AppState;
use zapgate_cache::progress::ProgressStore;
use zapgate_cache::rate_limit::{MemoryCounter, RateLimiter};
use zapgate_cache::response::ResponseCache;
use zapgate_cache::Cache;
use zapgate_events::EventBus;
use zapgate_provider::ProviderClient;
use zapgate_sync::store::PgStore;
use zapgate_sync::{EngineConfig, SyncEngine};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "zapgate=debug,zapgate_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = zapgate_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    zapgate_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    zapgate_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Redis (optional) ---
    // Without Redis the limiter runs on in-process counters, sync
    // progress snapshots are not persisted, and gateway responses are
    // not cached.
    let (limiter, progress, responses) = match &config.redis_url {
        Some(url) => {
            let cache = Cache::connect(url).await.expect("Failed to connect to Redis");
            tracing::info!("Redis connected");
            (
                RateLimiter::new(Arc::new(cache.clone())),
                ProgressStore::new(cache.clone()),
                ResponseCache::new(cache),
            )
        }
        None => {
            tracing::warn!("REDIS_URL not set, using in-process rate limiting");
            (
                RateLimiter::new(Arc::new(MemoryCounter::default())),
                ProgressStore::disabled(),
                ResponseCache::disabled(),
            )
        }
    };

    // --- Gateway client ---
    let gateway = ProviderClient::new(config.provider_url.clone(), config.provider_api_key.clone());
    tracing::info!(provider_url = %config.provider_url, "Gateway client ready");

    // --- Event bus ---
    let event_bus = Arc::new(EventBus::new());

    // --- Sync engine ---
    let engine = SyncEngine::new(
        Arc::new(PgStore::new(pool.clone())),
        Arc::new(gateway),
        Arc::clone(&event_bus) as Arc<dyn zapgate_events::Broadcaster>,
        limiter,
        progress,
        responses,
        EngineConfig {
            webhook_base_url: config.webhook_base_url.clone(),
            ..EngineConfig::default()
        },
    );

    // --- App state and router ---
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        engine,
        event_bus,
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server
/// shuts down cleanly whether stopped interactively or by a process
/// manager (e.g. systemd, Docker, Kubernetes).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
