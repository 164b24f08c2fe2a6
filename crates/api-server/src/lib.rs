//! Market intelligence API server
//!
//! Serves normalized agentic AI analyses, memoized in a process-local
//! [`ResponseCache`] shared through [`AppState`].

use agentic_client::AgenticClient;
use axum::{
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use intel_cache::ResponseCache;
use intel_core::{IntelError, IntelligenceFetcher, NormalizedIntelligenceRecord};
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod auth;
pub mod config;
pub mod intelligence_routes;
pub mod request_id;
pub mod security_headers;

use auth::Role;
pub use config::ServerConfig;

/// Shared state handed to every route handler
#[derive(Clone)]
pub struct AppState {
    pub fetcher: Arc<dyn IntelligenceFetcher>,
    pub intel_cache: Arc<ResponseCache<NormalizedIntelligenceRecord>>,
    /// SHA-256 key hash -> role. Empty means authentication is disabled.
    pub api_keys: Arc<HashMap<String, Role>>,
}

impl AppState {
    pub fn new(
        fetcher: Arc<dyn IntelligenceFetcher>,
        intel_cache: Arc<ResponseCache<NormalizedIntelligenceRecord>>,
        api_keys: HashMap<String, Role>,
    ) -> Self {
        Self {
            fetcher,
            intel_cache,
            api_keys: Arc::new(api_keys),
        }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(
            Arc::new(AgenticClient::from_config(&config.agentic)),
            Arc::new(ResponseCache::with_config(config.cache.clone())),
            config.api_keys.clone(),
        )
    }
}

/// Envelope for diagnostic endpoints
#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

/// Handler error. Known [`IntelError`]s map to specific status codes,
/// everything else is a 500.
#[derive(Debug)]
pub struct AppError(anyhow::Error);

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self.0.downcast_ref::<IntelError>() {
            Some(IntelError::InvalidRequest(_)) => StatusCode::BAD_REQUEST,
            Some(IntelError::InvalidUpstreamFormat) | Some(IntelError::Upstream { .. }) => {
                StatusCode::BAD_GATEWAY
            }
            Some(IntelError::NoResponse) => StatusCode::SERVICE_UNAVAILABLE,
            Some(IntelError::Timeout) => StatusCode::GATEWAY_TIMEOUT,
            Some(IntelError::Request(_)) | None => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed ({}): {:#}", status, self.0);
        }

        (
            status,
            Json(json!({
                "success": false,
                "error": self.0.to_string(),
            })),
        )
            .into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub fn build_router(state: AppState) -> Router {
    let protected = intelligence_routes::intelligence_routes()
        .layer(middleware::from_fn_with_state(state.clone(), auth::auth_middleware));

    Router::new()
        .route("/health", get(health))
        .merge(protected)
        .layer(middleware::from_fn(security_headers::security_headers_middleware))
        .layer(middleware::from_fn(request_id::request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn init_tracing(json_logging: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    if json_logging {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutdown signal received");
}

pub async fn run_server() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = ServerConfig::from_env()?;
    init_tracing(config.json_logging);

    if config.api_keys.is_empty() {
        tracing::warn!("API_KEYS not set: authentication disabled (development mode)");
    }
    tracing::info!(
        "Agentic AI service: {} (timeout {}s)",
        config.agentic.base_url,
        config.agentic.timeout.as_secs()
    );
    tracing::info!(
        "Intel cache TTL {}-{}s, sweep every {} inserts",
        config.cache.min_ttl.as_secs(),
        config.cache.max_ttl.as_secs(),
        config.cache.sweep_every
    );

    let app = build_router(AppState::from_config(&config));

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind {}: {}", addr, e))?;
    tracing::info!("Market intelligence API listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
