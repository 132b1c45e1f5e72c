//! Tool-calling step executor.
//!
//! Each step asks the model for the next move given the whole conversation
//! and the available tools, then runs whatever tools it picked:
//!
//! - **Think**: system prompt + conversation + next-step prompt → provider
//! - **Act**: dispatch each requested tool call through the registry
//! - **Observe**: append every result as a tool turn for the next step
//!
//! A call to the `terminate` tool finishes the run.

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};
use wayfarer_config::AppConfig;
use wayfarer_core::error::{AgentError, ToolError};
use wayfarer_core::event::{DomainEvent, EventBus};
use wayfarer_core::message::{Message, MessageToolCall};
use wayfarer_core::provider::{Provider, ProviderRequest};
use wayfarer_core::tool::{TERMINATE_TOOL, ToolCall, ToolRegistry};

use crate::engine::RunContext;
use crate::executor::StepExecutor;

const NO_ACTION_SUMMARY: &str = "Thinking complete - no action needed";

/// What to do when a tool call fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorPolicy {
    /// Record "Error: ..." as the tool's result and keep going
    #[default]
    Report,
    /// Fail the step, which ends the run in `Error`
    Propagate,
}

impl std::str::FromStr for ToolErrorPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "report" => Ok(Self::Report),
            "propagate" => Ok(Self::Propagate),
            other => Err(format!("unknown tool error policy: {other}")),
        }
    }
}

/// Step executor that lets the model call tools.
pub struct ToolCallAgent {
    name: String,
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    tools: Arc<ToolRegistry>,
    policy: ToolErrorPolicy,
    event_bus: Option<Arc<EventBus>>,
}

impl ToolCallAgent {
    pub fn new(
        name: impl Into<String>,
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        tools: Arc<ToolRegistry>,
    ) -> Self {
        Self {
            name: name.into(),
            provider,
            model: model.into(),
            temperature: 0.7,
            max_tokens: None,
            tools,
            policy: ToolErrorPolicy::default(),
            event_bus: None,
        }
    }

    /// An agent using the configured model, sampling settings and tool
    /// error policy.
    pub fn from_config(
        name: impl Into<String>,
        config: &AppConfig,
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
    ) -> Result<Self, AgentError> {
        let policy = config
            .agent
            .tool_error_policy
            .parse::<ToolErrorPolicy>()
            .map_err(AgentError::InvalidArgument)?;
        Ok(Self::new(name, provider, &config.default_model, tools)
            .with_temperature(config.default_temperature)
            .with_max_tokens(config.default_max_tokens)
            .with_tool_error_policy(policy))
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    pub fn with_tool_error_policy(mut self, policy: ToolErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(bus);
        self
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// The messages sent to the model for the next step.
    ///
    /// The next-step prompt rides along as a trailing user turn but is not
    /// stored in the conversation.
    fn build_messages(run: &RunContext) -> Vec<Message> {
        let history = run.conversation().messages();
        let mut messages = Vec::with_capacity(history.len() + 2);
        if !run.system_prompt().is_empty() {
            messages.push(Message::system(run.system_prompt()));
        }
        messages.extend(history.iter().cloned());
        if !run.next_step_prompt().is_empty() {
            messages.push(Message::user(run.next_step_prompt()));
        }
        messages
    }

    /// Run one requested tool call and return the text to record for it.
    async fn dispatch(&self, tc: &MessageToolCall) -> Result<String, ToolError> {
        let arguments = if tc.arguments.trim().is_empty() {
            serde_json::json!({})
        } else {
            serde_json::from_str(&tc.arguments).map_err(|e| {
                ToolError::InvalidArguments(format!("{} arguments are not valid JSON: {e}", tc.name))
            })?
        };

        let call = ToolCall {
            id: tc.id.clone(),
            name: tc.name.clone(),
            arguments,
        };

        let start = std::time::Instant::now();
        let result = self.tools.execute(&call).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        self.publish(DomainEvent::ToolExecuted {
            tool_name: tc.name.clone(),
            success: result.as_ref().is_ok_and(|r| r.success),
            duration_ms,
            timestamp: Utc::now(),
        });

        result.map(|r| r.output)
    }

    fn publish(&self, event: DomainEvent) {
        if let Some(bus) = &self.event_bus {
            bus.publish(event);
        }
    }
}

#[async_trait]
impl StepExecutor for ToolCallAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn step(&mut self, run: &mut RunContext) -> wayfarer_core::Result<String> {
        let request = ProviderRequest {
            model: self.model.clone(),
            messages: Self::build_messages(run),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            tools: self.tools.definitions(),
            stream: false,
            stop: vec![],
        };

        let response = self.provider.complete(request).await?;
        let tool_calls = response.message.tool_calls.clone();
        let thought = response.message.content.clone();
        run.push_message(response.message);

        if tool_calls.is_empty() {
            debug!(agent = %self.name, step = run.current_step(), "No tool calls requested");
            return Ok(if thought.trim().is_empty() {
                NO_ACTION_SUMMARY.to_string()
            } else {
                thought
            });
        }

        debug!(
            agent = %self.name,
            step = run.current_step(),
            tools = tool_calls.len(),
            "Dispatching tool calls"
        );

        let mut lines = Vec::with_capacity(tool_calls.len());
        for tc in &tool_calls {
            let output = match self.dispatch(tc).await {
                Ok(output) => output,
                Err(e) => match self.policy {
                    ToolErrorPolicy::Report => {
                        warn!(tool = %tc.name, error = %e, "Tool call failed");
                        format!("Error: {e}")
                    }
                    ToolErrorPolicy::Propagate => return Err(e.into()),
                },
            };

            run.push_message(Message::tool_result(&tc.id, &output));
            lines.push(format!("Tool {} returned: {}", tc.name, output));

            if tc.name == TERMINATE_TOOL {
                info!(agent = %self.name, step = run.current_step(), "Terminate tool called");
                run.finish();
            }
        }

        Ok(lines.join("\n"))
    }
}
