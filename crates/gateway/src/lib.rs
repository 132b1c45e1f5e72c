//! HTTP API gateway for Wayfarer.
//!
//! Exposes a health check and the v1 API: blocking and SSE-streamed agent
//! runs, tool listing and a live feed of domain events.
//!
//! Built on Axum.

pub mod api_v1;

use axum::extract::DefaultBodyLimit;
use axum::{
    Router,
    extract::{Query, State},
    http::{HeaderValue, Method, header},
    response::Json,
    routing::get,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};

use wayfarer_config::AppConfig;
use wayfarer_core::event::EventBus;

pub use api_v1::{ApiState, SharedApiState};

/// Build the full router: `/health` plus the v1 API under `/v1`.
///
/// Layers applied:
/// - CORS restricted to the gateway's own origin
/// - Request body size limit (1 MB)
/// - HTTP trace logging
pub fn build_router(state: SharedApiState) -> Router {
    let cors = cors_layer(&state.config.gateway.host, state.config.gateway.port);

    Router::new()
        .route("/health", get(health_handler))
        .with_state(state.clone())
        .nest("/v1", api_v1::v1_router(state))
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

fn cors_layer(host: &str, port: u16) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));

    match HeaderValue::from_str(&format!("http://{host}:{port}")) {
        Ok(origin) => layer.allow_origin(AllowOrigin::exact(origin)),
        Err(e) => {
            warn!(host = %host, error = %e, "Host is not a valid origin, CORS origins disabled");
            layer
        }
    }
}

/// Start the gateway HTTP server.
///
/// Builds the provider, tools and event bus once and shares them between
/// all requests.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let router = wayfarer_providers::build_from_config(&config);
    let provider = router
        .default_provider()
        .ok_or_else(|| format!("default provider '{}' is not available", config.default_provider))?;

    let tools = Arc::new(wayfarer_tools::default_registry(&config.tools.output_dir));
    let event_bus = Arc::new(EventBus::default());

    info!(
        provider = %config.default_provider,
        model = %config.default_model,
        tools = tools.len(),
        "Gateway components ready"
    );

    let state = Arc::new(ApiState::new(config, provider, tools, event_bus));
    let app = build_router(state);

    info!(address = %addr, "Gateway listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub provider: String,
    pub model: String,
    /// Set only when `?deep=true` asked the provider itself
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_reachable: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct HealthQuery {
    #[serde(default)]
    deep: bool,
}

async fn health_handler(
    State(state): State<SharedApiState>,
    Query(query): Query<HealthQuery>,
) -> Json<HealthResponse> {
    let provider_reachable = if query.deep {
        match state.provider.health_check().await {
            Ok(reachable) => Some(reachable),
            Err(e) => {
                warn!(provider = %state.provider.name(), error = %e, "Provider health check failed");
                Some(false)
            }
        }
    } else {
        None
    };

    let status = if provider_reachable == Some(false) {
        "degraded"
    } else {
        "ok"
    };

    Json(HealthResponse {
        status: status.into(),
        version: env!("CARGO_PKG_VERSION").into(),
        provider: state.provider.name().to_string(),
        model: state.config.default_model.clone(),
        provider_reachable,
    })
}
