//! The agent engine: run state machine and step loop.
//!
//! An [`AgentEngine`] drives a [`StepExecutor`] through one run:
//!
//! 1. **Start** from `Idle` only; a blank prompt or a zero limit is refused
//! 2. **Step** up to `max_steps` times, checking for stalls after each step
//! 3. **Stop** when the executor finishes the run, the budget runs out, a
//!    step fails, the deadline passes, or the stream consumer goes away
//! 4. **Clean up** exactly once, whatever way the run ended
//!
//! Two modes share the same loop. [`AgentEngine::run`] collects report lines
//! and returns them; [`AgentEngine::run_stream`] moves the engine into a
//! spawned task and pushes [`RunEvent`]s as they are produced.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use wayfarer_core::error::AgentError;
use wayfarer_core::event::{DomainEvent, EventBus};
use wayfarer_core::message::{Conversation, Message};
use wayfarer_core::AgentState;

use crate::executor::StepExecutor;
use crate::stall;
use crate::stream_event::RunEvent;

pub const DEFAULT_MAX_STEPS: usize = 10;
pub const DEFAULT_STALL_THRESHOLD: usize = 2;
pub const DEFAULT_STREAM_TIMEOUT: Duration = Duration::from_secs(300);

const STREAM_BUFFER: usize = 128;

/// Receiving end of a streaming run. Dropping it cancels the run.
pub type RunStream = mpsc::Receiver<RunEvent>;

/// The record of one run, owned by its engine.
#[derive(Debug, Clone)]
pub struct RunContext {
    state: AgentState,
    current_step: usize,
    max_steps: usize,
    stall_threshold: usize,
    system_prompt: String,
    next_step_prompt: String,
    conversation: Conversation,
}

impl RunContext {
    pub fn new(system_prompt: impl Into<String>, next_step_prompt: impl Into<String>) -> Self {
        Self {
            state: AgentState::Idle,
            current_step: 0,
            max_steps: DEFAULT_MAX_STEPS,
            stall_threshold: DEFAULT_STALL_THRESHOLD,
            system_prompt: system_prompt.into(),
            next_step_prompt: next_step_prompt.into(),
            conversation: Conversation::new(),
        }
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_stall_threshold(mut self, threshold: usize) -> Self {
        self.stall_threshold = threshold;
        self
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    /// Steps started so far (0 before the first).
    pub fn current_step(&self) -> usize {
        self.current_step
    }

    pub fn max_steps(&self) -> usize {
        self.max_steps
    }

    pub fn stall_threshold(&self) -> usize {
        self.stall_threshold
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Extra instruction sent with every step; grows after each stall.
    pub fn next_step_prompt(&self) -> &str {
        &self.next_step_prompt
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Append a turn to the run's conversation.
    pub fn push_message(&mut self, message: Message) {
        self.conversation.push(message);
    }

    /// End the run successfully after the current step.
    ///
    /// Only a running run can finish; calls in any other state are ignored.
    pub fn finish(&mut self) {
        if self.state == AgentState::Running {
            self.state = AgentState::Finished;
        }
    }

    /// Both limits must be at least 1.
    pub(crate) fn check_limits(&self) -> Result<(), AgentError> {
        if self.max_steps == 0 {
            return Err(AgentError::InvalidArgument("max_steps must be at least 1".into()));
        }
        if self.stall_threshold == 0 {
            return Err(AgentError::InvalidArgument("stall_threshold must be at least 1".into()));
        }
        Ok(())
    }

    /// End the run in `Error`, overriding a finish made during the same step.
    fn fail(&mut self) {
        if self.state != AgentState::Idle {
            self.state = AgentState::Error;
        }
    }
}

/// Output of a blocking run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Report lines in production order
    pub lines: Vec<String>,
    /// Terminal state of the run
    pub state: AgentState,
    /// Steps executed
    pub steps: usize,
}

impl RunReport {
    /// All lines joined with newlines.
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

impl std::fmt::Display for RunReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text())
    }
}

/// Where the loop sends what it produces.
enum Sink<'a> {
    Report(&'a mut Vec<String>),
    Channel(&'a mpsc::Sender<RunEvent>),
}

impl Sink<'_> {
    /// Returns false once nobody is listening.
    async fn emit(&mut self, event: RunEvent) -> bool {
        match self {
            Sink::Report(lines) => {
                if let Some(line) = event.report_line() {
                    lines.push(line);
                }
                true
            }
            Sink::Channel(tx) => tx.send(event).await.is_ok(),
        }
    }
}

/// Why the loop stopped early.
enum Halt {
    Failed(AgentError),
    Cancelled,
}

enum Outcome {
    Completed,
    Failed(AgentError),
    Cancelled,
    TimedOut,
}

/// Drives one [`StepExecutor`] through one run.
pub struct AgentEngine<E: StepExecutor> {
    executor: E,
    run: RunContext,
    stream_timeout: Duration,
    event_bus: Option<Arc<EventBus>>,
}

impl<E: StepExecutor> AgentEngine<E> {
    pub fn new(executor: E, run: RunContext) -> Self {
        Self {
            executor,
            run,
            stream_timeout: DEFAULT_STREAM_TIMEOUT,
            event_bus: None,
        }
    }

    /// Wall-clock limit for [`run_stream`](Self::run_stream).
    pub fn with_stream_timeout(mut self, timeout: Duration) -> Self {
        self.stream_timeout = timeout;
        self
    }

    /// Publish run lifecycle events on the given bus.
    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(bus);
        self
    }

    pub fn state(&self) -> AgentState {
        self.run.state
    }

    pub fn run_context(&self) -> &RunContext {
        &self.run
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn stream_timeout(&self) -> Duration {
        self.stream_timeout
    }

    /// Execute a run to completion and return its report.
    ///
    /// Fails without touching any state if the engine is not `Idle`, or on a
    /// blank prompt or a zero limit. A failing step is not an `Err`: the run ends in
    /// `Error` and the report holds a single "Run failed" line.
    pub async fn run(&mut self, user_prompt: &str) -> Result<RunReport, AgentError> {
        self.begin(user_prompt)?;

        let mut lines = Vec::new();
        let outcome = match self.drive(&mut Sink::Report(&mut lines)).await {
            Ok(()) => Outcome::Completed,
            Err(Halt::Failed(err)) => Outcome::Failed(err),
            Err(Halt::Cancelled) => Outcome::Cancelled,
        };

        if let Some(line) = self.settle(&outcome).await {
            lines = vec![line];
        }

        Ok(RunReport {
            lines,
            state: self.run.state,
            steps: self.run.current_step,
        })
    }

    /// Start a run on a background task and stream its events.
    ///
    /// Returns immediately. The stream ends with exactly one terminal event
    /// (`done`, `error` or `timeout`) unless the consumer drops it first.
    pub fn run_stream(self, user_prompt: impl Into<String>) -> RunStream
    where
        E: 'static,
    {
        self.spawn_stream(user_prompt).0
    }

    /// Like [`run_stream`](Self::run_stream), also returning the run's task.
    ///
    /// The task completes once cleanup has run. Awaiting it after dropping
    /// the stream waits for a cancelled run to wind down.
    pub fn spawn_stream(self, user_prompt: impl Into<String>) -> (RunStream, JoinHandle<()>)
    where
        E: 'static,
    {
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let user_prompt = user_prompt.into();
        let task = tokio::spawn(self.stream_task(user_prompt, tx));
        (rx, task)
    }

    async fn stream_task(mut self, user_prompt: String, tx: mpsc::Sender<RunEvent>) {
        if let Err(e) = self.begin(&user_prompt) {
            warn!(agent = %self.executor.name(), error = %e, "Streaming run refused");
            let _ = tx.send(RunEvent::Error { message: e.to_string() }).await;
            return;
        }

        let deadline = tokio::time::Instant::now() + self.stream_timeout;
        let outcome = {
            let mut sink = Sink::Channel(&tx);
            tokio::select! {
                biased;
                _ = tx.closed() => Outcome::Cancelled,
                _ = tokio::time::sleep_until(deadline) => Outcome::TimedOut,
                result = self.drive(&mut sink) => match result {
                    Ok(()) => Outcome::Completed,
                    Err(Halt::Failed(err)) => Outcome::Failed(err),
                    Err(Halt::Cancelled) => Outcome::Cancelled,
                },
            }
        };

        let failure_line = self.settle(&outcome).await;

        let last = match outcome {
            Outcome::Completed => RunEvent::Done {
                state: self.run.state,
                steps: self.run.current_step,
            },
            Outcome::Failed(_) => RunEvent::Error {
                message: failure_line.unwrap_or_default(),
            },
            Outcome::TimedOut => {
                let secs = self.stream_timeout.as_secs();
                RunEvent::Timeout {
                    secs,
                    message: AgentError::Timeout { secs }.to_string(),
                }
            }
            Outcome::Cancelled => return,
        };
        let _ = tx.send(last).await;
    }

    /// Check preconditions, then move to `Running` with the prompt appended.
    fn begin(&mut self, user_prompt: &str) -> Result<(), AgentError> {
        if self.run.state != AgentState::Idle {
            return Err(AgentError::InvalidState(self.run.state));
        }
        if user_prompt.trim().is_empty() {
            return Err(AgentError::InvalidArgument(
                "user prompt must not be empty".into(),
            ));
        }
        self.run.check_limits()?;

        self.run.state = AgentState::Running;
        self.run.push_message(Message::user(user_prompt));

        info!(
            agent = %self.executor.name(),
            max_steps = self.run.max_steps,
            "Run starting"
        );
        self.publish(DomainEvent::RunStarted {
            agent: self.executor.name().to_string(),
            conversation_id: self.run.conversation.id.to_string(),
            max_steps: self.run.max_steps,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// The step loop shared by both modes.
    async fn drive(&mut self, sink: &mut Sink<'_>) -> Result<(), Halt> {
        while !self.run.state.is_terminal() && self.run.current_step < self.run.max_steps {
            self.run.current_step += 1;
            let step = self.run.current_step;
            debug!(agent = %self.executor.name(), step, max_steps = self.run.max_steps, "Executing step");

            let summary = self
                .executor
                .step(&mut self.run)
                .await
                .map_err(|e| Halt::Failed(AgentError::StepFailure(e.to_string())))?;

            self.publish(DomainEvent::StepCompleted {
                agent: self.executor.name().to_string(),
                step,
                timestamp: Utc::now(),
            });
            if !sink.emit(RunEvent::Step { step, summary }).await {
                return Err(Halt::Cancelled);
            }

            if stall::is_stalled(self.run.conversation.messages(), self.run.stall_threshold) {
                warn!(agent = %self.executor.name(), step, "Stall detected, adjusting next-step prompt");
                self.run.next_step_prompt = stall::with_correction(&self.run.next_step_prompt);
                self.publish(DomainEvent::StallDetected {
                    agent: self.executor.name().to_string(),
                    step,
                    timestamp: Utc::now(),
                });
                let message = format!(
                    "Stall detected at step {step}: repeated assistant response, changing strategy"
                );
                if !sink.emit(RunEvent::Stall { step, message }).await {
                    return Err(Halt::Cancelled);
                }
            }
        }

        if !self.run.state.is_terminal() {
            self.run.finish();
            info!(agent = %self.executor.name(), max_steps = self.run.max_steps, "Step budget reached");
            let message = format!("Terminated: reached step budget ({})", self.run.max_steps);
            if !sink.emit(RunEvent::Notice { message }).await {
                return Err(Halt::Cancelled);
            }
        }

        Ok(())
    }

    /// Apply the terminal transition for `outcome` and run cleanup once.
    ///
    /// Returns the failure line when the run ended in `Error`.
    async fn settle(&mut self, outcome: &Outcome) -> Option<String> {
        let failure = match outcome {
            Outcome::Completed => None,
            Outcome::Cancelled => {
                debug!(agent = %self.executor.name(), "Stream consumer went away");
                None
            }
            Outcome::Failed(err) => {
                error!(agent = %self.executor.name(), step = self.run.current_step, error = %err, "Run failed");
                self.run.fail();
                Some(err.to_string())
            }
            Outcome::TimedOut => {
                let secs = self.stream_timeout.as_secs();
                warn!(agent = %self.executor.name(), secs, "Run timed out");
                self.run.fail();
                Some(AgentError::Timeout { secs }.to_string())
            }
        };

        // Anything still running at this point ended without a verdict.
        self.run.finish();

        self.executor.cleanup(&self.run).await;

        info!(
            agent = %self.executor.name(),
            state = %self.run.state,
            steps = self.run.current_step,
            "Run ended"
        );
        self.publish(DomainEvent::RunFinished {
            agent: self.executor.name().to_string(),
            state: self.run.state,
            steps: self.run.current_step,
            timestamp: Utc::now(),
        });

        failure
    }

    fn publish(&self, event: DomainEvent) {
        if let Some(bus) = &self.event_bus {
            bus.publish(event);
        }
    }
}
