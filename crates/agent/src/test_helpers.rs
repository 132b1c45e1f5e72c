//! Shared test helpers for engine and executor tests.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wayfarer_core::error::ProviderError;
use wayfarer_core::message::{Message, MessageToolCall};
use wayfarer_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use wayfarer_core::AgentState;

use crate::engine::RunContext;
use crate::executor::StepExecutor;

/// What a [`ScriptedExecutor`] does on one step.
pub enum ScriptedStep {
    /// Append an assistant turn with this text and return it
    Say(String),
    /// Like `Say`, then finish the run
    Finish(String),
    /// Fail the step
    Fail(String),
    /// Sleep, then return "slept"
    Sleep(Duration),
    /// Finish the run, then sleep before returning
    FinishThenSleep(Duration),
}

impl ScriptedStep {
    pub fn say(text: &str) -> Self {
        Self::Say(text.into())
    }
    pub fn finish(text: &str) -> Self {
        Self::Finish(text.into())
    }
    pub fn fail(reason: &str) -> Self {
        Self::Fail(reason.into())
    }
    pub fn sleep(duration: Duration) -> Self {
        Self::Sleep(duration)
    }
    pub fn finish_then_sleep(duration: Duration) -> Self {
        Self::FinishThenSleep(duration)
    }
}

/// An executor that plays back a fixed script and records what it saw.
pub struct ScriptedExecutor {
    steps: VecDeque<ScriptedStep>,
    cleanups: Arc<AtomicUsize>,
    cleanup_state: Arc<Mutex<Option<AgentState>>>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl ScriptedExecutor {
    pub fn new(steps: Vec<ScriptedStep>) -> Self {
        Self {
            steps: steps.into(),
            cleanups: Arc::new(AtomicUsize::new(0)),
            cleanup_state: Arc::new(Mutex::new(None)),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn cleanup_counter(&self) -> Arc<AtomicUsize> {
        self.cleanups.clone()
    }

    /// State of the run when cleanup last ran.
    pub fn last_cleanup_state(&self) -> Arc<Mutex<Option<AgentState>>> {
        self.cleanup_state.clone()
    }

    /// Next-step prompt observed at the start of each step.
    pub fn seen_prompts(&self) -> Arc<Mutex<Vec<String>>> {
        self.prompts.clone()
    }
}

#[async_trait]
impl StepExecutor for ScriptedExecutor {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn step(&mut self, run: &mut RunContext) -> wayfarer_core::Result<String> {
        self.prompts
            .lock()
            .unwrap()
            .push(run.next_step_prompt().to_string());

        match self.steps.pop_front() {
            Some(ScriptedStep::Say(text)) => {
                run.push_message(Message::assistant(&text));
                Ok(text)
            }
            Some(ScriptedStep::Finish(text)) => {
                run.push_message(Message::assistant(&text));
                run.finish();
                Ok(text)
            }
            Some(ScriptedStep::Fail(reason)) => Err(wayfarer_core::Error::Internal(reason)),
            Some(ScriptedStep::Sleep(duration)) => {
                tokio::time::sleep(duration).await;
                Ok("slept".into())
            }
            Some(ScriptedStep::FinishThenSleep(duration)) => {
                run.finish();
                tokio::time::sleep(duration).await;
                Ok("slept".into())
            }
            None => Ok("idle".into()),
        }
    }

    async fn cleanup(&mut self, run: &RunContext) {
        self.cleanups.fetch_add(1, Ordering::SeqCst);
        *self.cleanup_state.lock().unwrap() = Some(run.state());
    }
}

/// A mock provider that returns a sequence of scripted responses and
/// records every request it receives.
pub struct SequentialMockProvider {
    responses: Mutex<VecDeque<Result<ProviderResponse, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl SequentialMockProvider {
    pub fn new(responses: Vec<ProviderResponse>) -> Self {
        Self::with_results(responses.into_iter().map(Ok).collect())
    }

    pub fn with_results(results: Vec<Result<ProviderResponse, ProviderError>>) -> Self {
        Self {
            responses: Mutex::new(results.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for SequentialMockProvider {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(make_text_response("no more scripted responses")))
    }
}

fn mock_usage() -> Option<Usage> {
    Some(Usage {
        prompt_tokens: 10,
        completion_tokens: 5,
        total_tokens: 15,
    })
}

/// Create a simple text response (no tool calls).
pub fn make_text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: mock_usage(),
        model: "mock-model".into(),
    }
}

/// Create a response with tool calls and optional thought content.
pub fn make_tool_call_response(tool_calls: Vec<MessageToolCall>, thought: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant_with_tools(thought, tool_calls),
        usage: mock_usage(),
        model: "mock-model".into(),
    }
}

/// Helper to create a tool call.
pub fn make_tool_call(name: &str, args: serde_json::Value) -> MessageToolCall {
    MessageToolCall {
        id: format!("call_{name}"),
        name: name.to_string(),
        arguments: serde_json::to_string(&args).unwrap(),
    }
}
