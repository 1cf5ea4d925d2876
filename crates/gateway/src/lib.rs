//! HTTP gateway for QuestWeaver.
//!
//! Routes:
//!
//! - `POST /api/orchestrate` runs one game-master turn
//! - `GET  /health` reports liveness and version
//!
//! Built on Axum. CORS mirrors the caller's origin, method and headers so
//! browser game clients on any host can call the API with credentials.

pub mod orchestrate;

use axum::extract::DefaultBodyLimit;
use axum::{
    Router,
    response::Json,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tracing::{info, warn};

use questweaver_agent::Orchestrator;
use questweaver_config::AppConfig;

/// Shared application state for the gateway.
pub struct GatewayState {
    pub orchestrator: Arc<Orchestrator>,
}

pub type SharedState = Arc<GatewayState>;

const MAX_BODY_BYTES: usize = 1024 * 1024;
const CORS_MAX_AGE: Duration = Duration::from_secs(86_400);

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/api/orchestrate", post(orchestrate::orchestrate_handler))
        .route("/health", get(health_handler))
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors_layer())
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
        .max_age(CORS_MAX_AGE)
}

/// Start the gateway HTTP server.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    if !config.has_api_key() {
        warn!("No API key configured; model calls will fail until one is set");
    }

    let providers = questweaver_providers::build_from_config(&config);
    let provider = providers
        .default()
        .ok_or_else(|| format!("No provider named '{}' is configured", config.default_provider))?;
    let store = questweaver_memory::build_from_config(&config);

    let state = Arc::new(GatewayState {
        orchestrator: Arc::new(Orchestrator::new(provider, store, &config)),
    });
    let app = build_router(state);

    info!(addr = %addr, model = %config.default_model, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- Handlers ---

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
    })
}
