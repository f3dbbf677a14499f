use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use sqlx::PgPool;
use tower::ServiceExt;

use zapgate_api::config::ServerConfig;
use zapgate_api::router::build_app_router;
use zapgate_api::state::AppState;
use zapgate_cache::progress::ProgressStore;
use zapgate_cache::rate_limit::{MemoryCounter, RateLimiter};
use zapgate_cache::response::ResponseCache;
use zapgate_events::EventBus;
use zapgate_provider::types::{CreatedInstance, InstanceInfo, PairingInfo, RemoteChat};
use zapgate_provider::ProviderError;
use zapgate_sync::gateway::Gateway;
use zapgate_sync::store::PgStore;
use zapgate_sync::{EngineConfig, SyncEngine};

/// Scriptable gateway stub so endpoint tests never touch a network.
///
/// By default every session exists, reports no transport state, and
/// pairing hands out a fixed QR code.
#[derive(Default)]
pub struct StubGateway {
    pub state: Mutex<Option<String>>,
    pub chats: Mutex<Vec<RemoteChat>>,
    pub created: Mutex<Vec<String>>,
    pub deleted: Mutex<Vec<String>>,
}

impl StubGateway {
    pub fn set_state(&self, state: &str) {
        *self.state.lock().unwrap() = Some(state.to_string());
    }
}

#[async_trait]
impl Gateway for StubGateway {
    async fn connection_state(
        &self,
        _instance_name: &str,
    ) -> Result<Option<String>, ProviderError> {
        Ok(self.state.lock().unwrap().clone())
    }

    async fn instance_info(
        &self,
        _instance_name: &str,
    ) -> Result<Option<InstanceInfo>, ProviderError> {
        Ok(None)
    }

    async fn fetch_chats(&self, _instance_name: &str) -> Result<Vec<RemoteChat>, ProviderError> {
        Ok(self.chats.lock().unwrap().clone())
    }

    async fn fetch_instances(&self) -> Result<Vec<InstanceInfo>, ProviderError> {
        Ok(Vec::new())
    }

    async fn create_instance(
        &self,
        instance_name: &str,
        _webhook_url: &str,
    ) -> Result<CreatedInstance, ProviderError> {
        self.created.lock().unwrap().push(instance_name.to_string());
        Ok(CreatedInstance {
            instance_name: instance_name.to_string(),
            qrcode: None,
        })
    }

    async fn delete_instance(&self, instance_name: &str) -> Result<(), ProviderError> {
        self.deleted.lock().unwrap().push(instance_name.to_string());
        Ok(())
    }

    async fn connect_instance(&self, _instance_name: &str) -> Result<PairingInfo, ProviderError> {
        Ok(PairingInfo {
            base64: Some("data:image/png;base64,STUBQR".to_string()),
            pairing_code: None,
        })
    }

    async fn set_webhook(
        &self,
        _instance_name: &str,
        _webhook_url: &str,
    ) -> Result<(), ProviderError> {
        Ok(())
    }
}

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        provider_url: "http://localhost:8080".to_string(),
        provider_api_key: "test-key".to_string(),
        webhook_base_url: "http://localhost:3000".to_string(),
        redis_url: None,
    }
}

/// Build the full application router with the production middleware
/// stack, a real Postgres-backed store, and a stub gateway.
pub fn build_test_app(pool: PgPool, gateway: Arc<StubGateway>) -> Router {
    let config = test_config();
    let event_bus = Arc::new(EventBus::new());

    let engine = SyncEngine::new(
        Arc::new(PgStore::new(pool.clone())),
        gateway,
        Arc::clone(&event_bus) as Arc<dyn zapgate_events::Broadcaster>,
        RateLimiter::new(Arc::new(MemoryCounter::default())),
        ProgressStore::disabled(),
        ResponseCache::disabled(),
        EngineConfig {
            batch_pause: std::time::Duration::ZERO,
            autosync_settle_delay: std::time::Duration::ZERO,
            ..EngineConfig::default()
        },
    );

    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        engine,
        event_bus,
    };

    build_app_router(state, &config)
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    app.oneshot(
        Request::builder()
            .uri(uri)
            .body(Body::empty())
            .expect("request"),
    )
    .await
    .expect("response")
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    app.oneshot(
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request"),
    )
    .await
    .expect("response")
}

pub async fn delete(app: Router, uri: &str) -> Response<Body> {
    app.oneshot(
        Request::builder()
            .method("DELETE")
            .uri(uri)
            .body(Body::empty())
            .expect("request"),
    )
    .await
    .expect("response")
}

/// Read a response body as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("valid JSON body")
}

/// Assert the response is an error with the given status and `code`.
pub async fn assert_error(response: Response<Body>, status: StatusCode, code: &str) {
    assert_eq!(response.status(), status);
    let json = body_json(response).await;
    assert_eq!(json["code"], code);
}
