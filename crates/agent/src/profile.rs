//! Agent profiles: concrete agents as data.
//!
//! A profile fixes the role name, prompts and limits of an agent. The
//! control flow is always the engine's; only these values differ.

use std::sync::Arc;
use std::time::Duration;
use wayfarer_config::AgentConfig;
use wayfarer_core::error::AgentError;
use wayfarer_core::event::EventBus;

use crate::engine::{AgentEngine, DEFAULT_STALL_THRESHOLD, DEFAULT_STREAM_TIMEOUT, RunContext};
use crate::executor::StepExecutor;

const GENERAL_SYSTEM_PROMPT: &str = "You are Wayfarer, an all-capable assistant that plans and \
     carries out tasks for the user, with a focus on travel: itineraries, schedules, budgets and \
     destination research. You have tools for checking the date and for saving documents such as \
     plans and HTML pages. Break complex requests into steps and use the tools when they help.";

const GENERAL_NEXT_STEP_PROMPT: &str = "Based on the user's needs, choose the most suitable tool \
     or combination of tools. For complex tasks, break the problem down and solve it step by \
     step. After each tool call, explain the result and decide what to do next. If you want to \
     stop the interaction at any point, use the `terminate` tool/function call.";

const HEALTH_SYSTEM_PROMPT: &str = "You are HealthAssistant, a professional assistant that \
     provides health-related information: general health topics, wellness, disease prevention, \
     healthy lifestyle choices and basic medical knowledge. You are not a replacement for \
     professional medical advice, diagnosis or treatment; for serious concerns, always recommend \
     consulting a qualified healthcare professional. Prefer evidence-based information.";

const HEALTH_NEXT_STEP_PROMPT: &str = "Based on the user's health questions or concerns, provide \
     helpful, accurate and scientifically backed information. Use tools when they help. Present \
     information clearly and compassionately, and acknowledge the limits of digital health \
     assistance. If you want to stop the interaction at any point, use the `terminate` \
     tool/function call.";

/// Name, prompts and limits of one concrete agent.
#[derive(Debug, Clone)]
pub struct AgentProfile {
    pub name: String,
    pub system_prompt: String,
    pub next_step_prompt: String,
    pub max_steps: usize,
    pub stall_threshold: usize,
    pub stream_timeout: Duration,
}

impl AgentProfile {
    /// General task and travel-planning assistant.
    pub fn general() -> Self {
        Self {
            name: "Wayfarer".into(),
            system_prompt: GENERAL_SYSTEM_PROMPT.into(),
            next_step_prompt: GENERAL_NEXT_STEP_PROMPT.into(),
            max_steps: 20,
            stall_threshold: DEFAULT_STALL_THRESHOLD,
            stream_timeout: DEFAULT_STREAM_TIMEOUT,
        }
    }

    /// Health-information assistant.
    pub fn health() -> Self {
        Self {
            name: "HealthAssistant".into(),
            system_prompt: HEALTH_SYSTEM_PROMPT.into(),
            next_step_prompt: HEALTH_NEXT_STEP_PROMPT.into(),
            max_steps: 15,
            stall_threshold: DEFAULT_STALL_THRESHOLD,
            stream_timeout: DEFAULT_STREAM_TIMEOUT,
        }
    }

    /// Look up a built-in profile by its config name.
    pub fn by_name(name: &str) -> Option<Self> {
        match name {
            "general" => Some(Self::general()),
            "health" => Some(Self::health()),
            _ => None,
        }
    }

    pub fn names() -> &'static [&'static str] {
        &["general", "health"]
    }

    /// The named profile with `[agent]` overrides applied.
    pub fn from_config(config: &AgentConfig) -> Result<Self, AgentError> {
        let mut profile = Self::by_name(&config.profile).ok_or_else(|| {
            AgentError::InvalidArgument(format!("unknown agent profile: {}", config.profile))
        })?;
        if let Some(max_steps) = config.max_steps {
            profile.max_steps = max_steps;
        }
        profile.stall_threshold = config.stall_threshold;
        profile.stream_timeout = Duration::from_secs(config.stream_timeout_secs);
        profile.run_context().check_limits()?;
        Ok(profile)
    }

    /// A fresh run record for this profile.
    pub fn run_context(&self) -> RunContext {
        RunContext::new(&self.system_prompt, &self.next_step_prompt)
            .with_max_steps(self.max_steps)
            .with_stall_threshold(self.stall_threshold)
    }

    /// An engine for one run of this profile.
    pub fn engine<E: StepExecutor>(
        &self,
        executor: E,
        event_bus: Option<Arc<EventBus>>,
    ) -> AgentEngine<E> {
        let engine =
            AgentEngine::new(executor, self.run_context()).with_stream_timeout(self.stream_timeout);
        match event_bus {
            Some(bus) => engine.with_event_bus(bus),
            None => engine,
        }
    }
}
