//! Agent run state.

use serde::{Deserialize, Serialize};

/// Lifecycle state of one agent run.
///
/// The only reachable transitions are `Idle → Running → Finished` and
/// `Idle → Running → Error`. `Finished` and `Error` are terminal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    /// Created, not started yet
    #[default]
    Idle,
    /// The step loop is executing
    Running,
    /// Ended normally: terminate tool, step budget, or consumer close
    Finished,
    /// Ended by a step failure or a timeout
    Error,
}

impl AgentState {
    /// Whether no further transition is possible from this state.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Error)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Finished => "finished",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for AgentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
