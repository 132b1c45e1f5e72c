//! The agent execution engine: the heart of Wayfarer.
//!
//! A run follows a bounded **Think → Act → Observe** loop:
//!
//! 1. **Receive** a user prompt; the run moves from `Idle` to `Running`
//! 2. **Step**: the executor asks the model what to do next and runs tools
//! 3. **Check** for stalls; a repeating model gets a corrective instruction
//! 4. **Stop** on the `terminate` tool, the step budget, a failure, a
//!    timeout, or a vanished stream consumer
//!
//! [`AgentEngine`] owns the loop and state machine, [`StepExecutor`] is the
//! per-step strategy, and [`ToolCallAgent`] is the tool-calling strategy
//! configured from an [`AgentProfile`].

pub mod engine;
pub mod executor;
pub mod profile;
pub mod stall;
pub mod stream_event;
pub mod toolcall;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use engine::{AgentEngine, RunContext, RunReport, RunStream};
pub use executor::StepExecutor;
pub use profile::AgentProfile;
pub use stall::{STALL_CORRECTION, is_stalled};
pub use stream_event::RunEvent;
pub use toolcall::{ToolCallAgent, ToolErrorPolicy};
