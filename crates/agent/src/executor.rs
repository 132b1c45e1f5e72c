//! The step strategy the engine drives.

use async_trait::async_trait;

use crate::engine::RunContext;

/// One unit of agent work per loop iteration.
///
/// The engine owns the loop, the state machine and stall handling. An
/// executor only decides what a single step does. It may append turns to
/// the conversation and may end the run early with [`RunContext::finish`].
/// Returning an error ends the run in the `Error` state.
#[async_trait]
pub trait StepExecutor: Send {
    /// Role name used in logs and events.
    fn name(&self) -> &str;

    /// Execute one step and return its summary line.
    async fn step(&mut self, run: &mut RunContext) -> wayfarer_core::Result<String>;

    /// Release per-run resources. The engine calls this exactly once per
    /// run, after the loop, whatever way the run ended.
    async fn cleanup(&mut self, _run: &RunContext) {}
}
