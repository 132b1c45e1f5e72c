//! HTTP API v1.
//!
//! Endpoints:
//!
//! - `POST /v1/agent/run`     — Run an agent to completion, get its report
//! - `POST /v1/agent/stream`  — Run an agent, get its events as an SSE stream
//! - `GET  /v1/tools`         — List available tools
//! - `GET  /v1/events`        — SSE feed of domain events

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::Json,
    response::sse::{Event as SseEvent, Sse},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::{BroadcastStream, ReceiverStream};
use tracing::{info, warn};

use wayfarer_agent::{AgentEngine, AgentProfile, StepExecutor, ToolCallAgent};
use wayfarer_config::AppConfig;
use wayfarer_core::AgentState;
use wayfarer_core::error::AgentError;
use wayfarer_core::event::EventBus;
use wayfarer_core::provider::Provider;
use wayfarer_core::tool::ToolRegistry;

// ── State ─────────────────────────────────────────────────────────────────

/// Shared state for the v1 API.
pub struct ApiState {
    pub config: AppConfig,
    pub provider: Arc<dyn Provider>,
    pub tools: Arc<ToolRegistry>,
    pub event_bus: Arc<EventBus>,
    /// Deadline for streamed runs on this surface.
    pub chat_timeout: Duration,
}

impl ApiState {
    pub fn new(
        config: AppConfig,
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        let chat_timeout = Duration::from_secs(config.gateway.chat_timeout_secs);
        Self {
            config,
            provider,
            tools,
            event_bus,
            chat_timeout,
        }
    }

    /// A fresh engine for one request.
    ///
    /// `profile` overrides `[agent].profile` from the config.
    fn engine(&self, profile: Option<&str>) -> Result<AgentEngine<ToolCallAgent>, AgentError> {
        let mut agent_config = self.config.agent.clone();
        if let Some(name) = profile {
            agent_config.profile = name.to_string();
        }
        let profile = AgentProfile::from_config(&agent_config)?;

        let executor = ToolCallAgent::from_config(
            &profile.name,
            &self.config,
            self.provider.clone(),
            self.tools.clone(),
        )?
        .with_event_bus(self.event_bus.clone());

        Ok(profile.engine(executor, Some(self.event_bus.clone())))
    }
}

pub type SharedApiState = Arc<ApiState>;

// ── Router ────────────────────────────────────────────────────────────────

/// Build the v1 API router. Nest this under "/v1" in the main router.
pub fn v1_router(state: SharedApiState) -> Router {
    Router::new()
        .route("/agent/run", post(run_handler))
        .route("/agent/stream", post(stream_handler))
        .route("/tools", get(list_tools_handler))
        .route("/events", get(event_stream_handler))
        .with_state(state)
}

// ── Request / Response types ──────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct RunRequest {
    /// The user's request.
    pub message: String,
    /// Built-in profile name (omit to use the configured one).
    #[serde(default)]
    pub profile: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RunResponse {
    pub agent: String,
    pub state: AgentState,
    pub steps: usize,
    pub lines: Vec<String>,
    /// The report lines joined with newlines.
    pub output: String,
}

#[derive(Serialize, Deserialize)]
pub struct ToolListResponse {
    pub tools: Vec<ToolDto>,
    pub count: usize,
}

#[derive(Serialize, Deserialize)]
pub struct ToolDto {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

#[derive(Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn agent_error(e: AgentError) -> ApiError {
    let status = match &e {
        AgentError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
        AgentError::InvalidState(_) => StatusCode::CONFLICT,
        AgentError::StepFailure(_) | AgentError::Timeout { .. } => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (
        status,
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
}

// ── Handlers ──────────────────────────────────────────────────────────────

/// `POST /v1/agent/run`: run to completion and return the report.
///
/// A run that fails mid-way is still `200`; its report has `state: "error"`
/// and a single "Run failed" line.
async fn run_handler(
    State(state): State<SharedApiState>,
    Json(payload): Json<RunRequest>,
) -> Result<Json<RunResponse>, ApiError> {
    info!(profile = ?payload.profile, "v1/agent/run request");

    let mut engine = state
        .engine(payload.profile.as_deref())
        .map_err(agent_error)?;
    let report = engine.run(&payload.message).await.map_err(agent_error)?;

    Ok(Json(RunResponse {
        agent: engine.executor().name().to_string(),
        state: report.state,
        steps: report.steps,
        output: report.text(),
        lines: report.lines,
    }))
}

/// `POST /v1/agent/stream`: run on a background task and stream its events.
///
/// Each SSE event is named after the run event type (`step`, `stall`,
/// `notice`, `done`, `error`, `timeout`). Closing the connection cancels
/// the run.
async fn stream_handler(
    State(state): State<SharedApiState>,
    Json(payload): Json<RunRequest>,
) -> Result<Sse<impl futures::Stream<Item = Result<SseEvent, Infallible>>>, ApiError> {
    info!(profile = ?payload.profile, "v1/agent/stream SSE request");

    let engine = state
        .engine(payload.profile.as_deref())
        .map_err(agent_error)?
        .with_stream_timeout(state.chat_timeout);

    let rx = engine.run_stream(payload.message);

    let stream = ReceiverStream::new(rx).map(|event| {
        let data = serde_json::to_string(&event).unwrap_or_default();
        Ok(SseEvent::default().event(event.event_type()).data(data))
    });

    Ok(Sse::new(stream))
}

/// `GET /v1/tools`: list available tools.
async fn list_tools_handler(State(state): State<SharedApiState>) -> Json<ToolListResponse> {
    let tools: Vec<ToolDto> = state
        .tools
        .definitions()
        .into_iter()
        .map(|d| ToolDto {
            name: d.name,
            description: d.description,
            parameters: d.parameters,
        })
        .collect();

    let count = tools.len();
    Json(ToolListResponse { tools, count })
}

/// `GET /v1/events`: SSE stream of domain events (runs, steps, stalls,
/// tool calls).
async fn event_stream_handler(
    State(state): State<SharedApiState>,
) -> Sse<impl futures::Stream<Item = Result<SseEvent, Infallible>>> {
    let rx = state.event_bus.subscribe();
    let stream = BroadcastStream::new(rx)
        .filter_map(|result| match result {
            Ok(event) => Some(event),
            Err(e) => {
                warn!(error = %e, "Event feed subscriber lagged");
                None
            }
        })
        .map(|event| {
            let data = serde_json::to_string(event.as_ref()).unwrap_or_default();
            Ok(SseEvent::default().event(event.name()).data(data))
        });

    Sse::new(stream)
}
