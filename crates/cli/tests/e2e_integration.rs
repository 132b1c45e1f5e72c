//! End-to-end integration tests for the Wayfarer agent engine.
//!
//! These tests exercise the full pipeline from configuration to report:
//! profile selection, the tool-calling executor, built-in tools and both
//! the blocking and streaming engine modes.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use wayfarer_agent::{
    AgentEngine, AgentProfile, RunContext, RunEvent, STALL_CORRECTION, StepExecutor, ToolCallAgent,
};
use wayfarer_config::AppConfig;
use wayfarer_core::AgentState;
use wayfarer_core::error::{AgentError, ProviderError};
use wayfarer_core::message::{Message, MessageToolCall};
use wayfarer_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use wayfarer_tools::default_registry;

// ── Mock Provider ────────────────────────────────────────────────────────

/// A mock provider that returns scripted responses in sequence.
///
/// Once the script runs out it keeps answering with distinct progress
/// notes, so an unscripted run only ends at its step budget.
struct ScriptedProvider {
    responses: std::sync::Mutex<Vec<Result<ProviderResponse, ProviderError>>>,
    requests: std::sync::Mutex<Vec<ProviderRequest>>,
    delay: Option<Duration>,
}

impl ScriptedProvider {
    fn new(responses: Vec<ProviderResponse>) -> Self {
        Self::with_results(responses.into_iter().map(Ok).collect())
    }

    fn with_results(results: Vec<Result<ProviderResponse, ProviderError>>) -> Self {
        Self {
            responses: std::sync::Mutex::new(results),
            requests: std::sync::Mutex::new(Vec::new()),
            delay: None,
        }
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let call = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request);
            requests.len()
        };
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(text_response(&format!("progress note {call}")))
        } else {
            responses.remove(0)
        }
    }
}

fn text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock".into(),
    }
}

fn tool_response(tool_calls: Vec<MessageToolCall>, thought: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant_with_tools(thought, tool_calls),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock".into(),
    }
}

fn make_tool_call(name: &str, args: serde_json::Value) -> MessageToolCall {
    MessageToolCall {
        id: format!("call_{name}"),
        name: name.to_string(),
        arguments: serde_json::to_string(&args).unwrap(),
    }
}

fn terminate() -> ProviderResponse {
    tool_response(
        vec![make_tool_call("terminate", serde_json::json!({}))],
        "",
    )
}

// ── Harness ──────────────────────────────────────────────────────────────

/// Wraps an executor and counts how often the engine cleans it up.
struct Observed<E> {
    inner: E,
    cleanups: Arc<AtomicUsize>,
}

#[async_trait::async_trait]
impl<E: StepExecutor> StepExecutor for Observed<E> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn step(&mut self, run: &mut RunContext) -> wayfarer_core::Result<String> {
        self.inner.step(run).await
    }

    async fn cleanup(&mut self, run: &RunContext) {
        self.cleanups.fetch_add(1, Ordering::SeqCst);
        self.inner.cleanup(run).await;
    }
}

/// An engine built the way the CLI builds one: config → profile → executor.
fn engine_for(
    config: &AppConfig,
    provider: Arc<ScriptedProvider>,
) -> (AgentEngine<Observed<ToolCallAgent>>, Arc<AtomicUsize>) {
    let profile = AgentProfile::from_config(&config.agent).unwrap();
    let tools = Arc::new(default_registry(&config.tools.output_dir));
    let executor = ToolCallAgent::from_config(&profile.name, config, provider, tools).unwrap();

    let cleanups = Arc::new(AtomicUsize::new(0));
    let observed = Observed {
        inner: executor,
        cleanups: cleanups.clone(),
    };
    (profile.engine(observed, None), cleanups)
}

fn config_with_budget(max_steps: usize) -> AppConfig {
    let mut config = AppConfig::default();
    config.agent.max_steps = Some(max_steps);
    config.tools.output_dir = std::env::temp_dir().join("wayfarer-e2e");
    config
}

async fn collect(mut rx: wayfarer_agent::RunStream) -> Vec<RunEvent> {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}

// ── E2E: Blocking runs ───────────────────────────────────────────────────

#[tokio::test]
async fn e2e_budget_exhaustion_finishes_run() {
    let provider = Arc::new(ScriptedProvider::new(vec![]));
    let (mut engine, cleanups) = engine_for(&config_with_budget(3), provider.clone());

    let report = engine.run("research Lisbon neighbourhoods").await.unwrap();

    assert_eq!(report.state, AgentState::Finished);
    assert_eq!(report.steps, 3);
    assert_eq!(report.lines.len(), 4);
    for (i, line) in report.lines[..3].iter().enumerate() {
        assert_eq!(line, &format!("Step {}: progress note {}", i + 1, i + 1));
    }
    assert_eq!(report.lines[3], "Terminated: reached step budget (3)");
    assert_eq!(provider.calls(), 3);
    assert_eq!(cleanups.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn e2e_terminate_on_second_step() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        text_response("Checking the calendar first"),
        terminate(),
    ]));
    let (mut engine, _) = engine_for(&config_with_budget(10), provider.clone());

    let report = engine.run("plan a weekend in Porto").await.unwrap();

    assert_eq!(report.state, AgentState::Finished);
    assert_eq!(
        report.lines,
        vec![
            "Step 1: Checking the calendar first",
            "Step 2: Tool terminate returned: Task finished"
        ]
    );
    assert!(!report.text().contains("step budget"));
    assert_eq!(provider.calls(), 2);
}

#[tokio::test]
async fn e2e_provider_failure_ends_in_error() {
    let provider = Arc::new(ScriptedProvider::with_results(vec![Err(
        ProviderError::Network("connection reset".into()),
    )]));
    let (mut engine, cleanups) = engine_for(&config_with_budget(10), provider.clone());

    let report = engine.run("plan a trip").await.unwrap();

    assert_eq!(report.state, AgentState::Error);
    assert_eq!(report.lines.len(), 1);
    assert!(report.lines[0].contains("connection reset"));
    assert_eq!(cleanups.load(Ordering::SeqCst), 1);
    assert_eq!(engine.state(), AgentState::Error);
}

#[tokio::test]
async fn e2e_repeated_answers_trigger_stall_correction() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        text_response("OK"),
        text_response("OK"),
        text_response("OK"),
        terminate(),
    ]));
    let (mut engine, _) = engine_for(&config_with_budget(10), provider.clone());

    let report = engine.run("go").await.unwrap();

    assert_eq!(report.state, AgentState::Finished);
    assert_eq!(&report.lines[..3], &["Step 1: OK", "Step 2: OK", "Step 3: OK"]);
    assert!(report.lines[3].starts_with("Stall detected at step 3"));
    assert_eq!(report.lines.iter().filter(|l| l.starts_with("Stall")).count(), 1);

    let requests = provider.requests();
    let last_user_turn = |i: usize| requests[i].messages.last().unwrap().content.clone();
    assert!(!last_user_turn(2).starts_with(STALL_CORRECTION));
    assert!(last_user_turn(3).starts_with(STALL_CORRECTION));
}

#[tokio::test]
async fn e2e_blank_prompt_is_rejected() {
    let provider = Arc::new(ScriptedProvider::new(vec![]));
    let (mut engine, cleanups) = engine_for(&config_with_budget(10), provider.clone());

    let err = engine.run("").await.unwrap_err();

    assert!(matches!(err, AgentError::InvalidArgument(_)));
    assert_eq!(engine.state(), AgentState::Idle);
    assert_eq!(provider.calls(), 0);
    assert_eq!(cleanups.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn e2e_engine_runs_only_once() {
    let provider = Arc::new(ScriptedProvider::new(vec![terminate()]));
    let (mut engine, _) = engine_for(&config_with_budget(10), provider);

    engine.run("first").await.unwrap();
    let err = engine.run("second").await.unwrap_err();
    assert_eq!(err, AgentError::InvalidState(AgentState::Finished));
}

// ── E2E: Tools ───────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_file_write_saves_generated_page() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_with_budget(10);
    config.tools.output_dir = dir.path().to_path_buf();

    let provider = Arc::new(ScriptedProvider::new(vec![
        tool_response(
            vec![make_tool_call(
                "file_write",
                serde_json::json!({
                    "path": "trips/porto.html",
                    "content": "<h1>Porto in two days</h1>"
                }),
            )],
            "Saving the itinerary page",
        ),
        terminate(),
    ]));
    let (mut engine, _) = engine_for(&config, provider);

    let report = engine.run("make me an itinerary page").await.unwrap();

    assert_eq!(report.state, AgentState::Finished);
    assert!(report.lines[0].starts_with("Step 1: Tool file_write returned: Successfully wrote"));
    let saved = std::fs::read_to_string(dir.path().join("trips/porto.html")).unwrap();
    assert_eq!(saved, "<h1>Porto in two days</h1>");
}

#[tokio::test]
async fn e2e_unknown_tool_reported_and_run_continues() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        tool_response(
            vec![make_tool_call("teleport", serde_json::json!({"to": "Kyoto"}))],
            "",
        ),
        terminate(),
    ]));
    let (mut engine, _) = engine_for(&config_with_budget(10), provider.clone());

    let report = engine.run("get me to Kyoto").await.unwrap();

    assert_eq!(report.state, AgentState::Finished);
    assert_eq!(
        report.lines[0],
        "Step 1: Tool teleport returned: Error: Tool not found: teleport"
    );

    // The failure was fed back to the model as the tool's result.
    let second = &provider.requests()[1];
    assert!(
        second
            .messages
            .iter()
            .any(|m| m.tool_call_id.as_deref() == Some("call_teleport")
                && m.content.contains("Tool not found"))
    );
}

#[tokio::test]
async fn e2e_propagate_policy_fails_run_on_tool_error() {
    let mut config = config_with_budget(10);
    config.agent.tool_error_policy = "propagate".into();

    let provider = Arc::new(ScriptedProvider::new(vec![tool_response(
        vec![make_tool_call("teleport", serde_json::json!({}))],
        "",
    )]));
    let (mut engine, cleanups) = engine_for(&config, provider.clone());

    let report = engine.run("get me to Kyoto").await.unwrap();

    assert_eq!(report.state, AgentState::Error);
    assert_eq!(report.lines.len(), 1);
    assert!(report.lines[0].starts_with("Run failed:"));
    assert!(report.lines[0].contains("Tool not found: teleport"));
    assert_eq!(provider.calls(), 1);
    assert_eq!(cleanups.load(Ordering::SeqCst), 1);
}

// ── E2E: Streaming runs ──────────────────────────────────────────────────

#[tokio::test]
async fn e2e_stream_emits_steps_then_done() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        tool_response(
            vec![make_tool_call("date_time", serde_json::json!({"format": "%Y"}))],
            "Checking today's date",
        ),
        terminate(),
    ]));
    let (engine, cleanups) = engine_for(&config_with_budget(10), provider);

    let events = collect(engine.run_stream("when should I travel?")).await;

    assert_eq!(events.len(), 3);
    match &events[0] {
        RunEvent::Step { step, summary } => {
            assert_eq!(*step, 1);
            assert!(summary.starts_with("Tool date_time returned: "));
        }
        other => panic!("expected step, got {other:?}"),
    }
    assert_eq!(
        events[1],
        RunEvent::Step {
            step: 2,
            summary: "Tool terminate returned: Task finished".into()
        }
    );
    assert_eq!(
        events[2],
        RunEvent::Done {
            state: AgentState::Finished,
            steps: 2
        }
    );
    assert_eq!(cleanups.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn e2e_stream_timeout_before_first_step() {
    let mut config = config_with_budget(10);
    config.agent.stream_timeout_secs = 5;

    let provider = Arc::new(ScriptedProvider::new(vec![]).with_delay(Duration::from_secs(600)));
    let (engine, cleanups) = engine_for(&config, provider);

    let events = collect(engine.run_stream("plan a trip")).await;

    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], RunEvent::Timeout { secs: 5, .. }));
    assert!(!events.iter().any(|e| matches!(e, RunEvent::Step { .. })));
    assert_eq!(cleanups.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn e2e_dropping_stream_cancels_run() {
    let provider = Arc::new(ScriptedProvider::new(vec![]).with_delay(Duration::from_secs(30)));
    let (engine, cleanups) = engine_for(&config_with_budget(10), provider.clone());

    let mut rx = engine.run_stream("plan a trip");
    let first = rx.recv().await.unwrap();
    assert!(matches!(first, RunEvent::Step { step: 1, .. }));
    drop(rx);

    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(cleanups.load(Ordering::SeqCst), 1);
    assert!(provider.calls() < 10);
}

#[tokio::test]
async fn e2e_stream_blank_prompt_single_error_event() {
    let provider = Arc::new(ScriptedProvider::new(vec![]));
    let (engine, cleanups) = engine_for(&config_with_budget(10), provider.clone());

    let events = collect(engine.run_stream("   ")).await;

    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], RunEvent::Error { .. }));
    assert_eq!(provider.calls(), 0);
    assert_eq!(cleanups.load(Ordering::SeqCst), 0);
}
