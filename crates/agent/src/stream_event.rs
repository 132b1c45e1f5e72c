//! Run events.
//!
//! `RunEvent` is what a streaming run pushes to its consumer, one event per
//! report line as soon as it is produced, then one terminal marker. The
//! gateway forwards them over SSE using [`RunEvent::event_type`] as the
//! event name.

use serde::{Deserialize, Serialize};
use wayfarer_core::AgentState;

/// Events emitted while a run executes.
///
/// - `step`    — one step finished, with its summary
/// - `stall`   — the stall detector fired after a step
/// - `notice`  — informational line (step budget reached)
/// - `done`    — the run ended normally; terminal
/// - `error`   — the run could not start or a step failed; terminal
/// - `timeout` — the run exceeded its deadline; terminal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    Step { step: usize, summary: String },

    Stall { step: usize, message: String },

    Notice { message: String },

    Done { state: AgentState, steps: usize },

    Error { message: String },

    Timeout { secs: u64, message: String },
}

impl RunEvent {
    /// SSE event name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Step { .. } => "step",
            Self::Stall { .. } => "stall",
            Self::Notice { .. } => "notice",
            Self::Done { .. } => "done",
            Self::Error { .. } => "error",
            Self::Timeout { .. } => "timeout",
        }
    }

    /// Whether the stream ends after this event.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Done { .. } | Self::Error { .. } | Self::Timeout { .. }
        )
    }

    /// The line this event contributes to a blocking run's report.
    pub fn report_line(&self) -> Option<String> {
        match self {
            Self::Step { step, summary } => Some(format!("Step {step}: {summary}")),
            Self::Stall { message, .. }
            | Self::Notice { message }
            | Self::Error { message }
            | Self::Timeout { message, .. } => Some(message.clone()),
            Self::Done { .. } => None,
        }
    }
}
