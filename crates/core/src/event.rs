//! Domain event system: decoupled observation of agent runs.
//!
//! Engines and executors publish events as a run progresses. Subscribers
//! (the gateway log stream, tests) receive every event and filter for
//! what they care about.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::agent::AgentState;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A run left `Idle`
    RunStarted {
        agent: String,
        conversation_id: String,
        max_steps: usize,
        timestamp: DateTime<Utc>,
    },

    /// One step of the loop completed
    StepCompleted {
        agent: String,
        step: usize,
        timestamp: DateTime<Utc>,
    },

    /// The stall detector fired
    StallDetected {
        agent: String,
        step: usize,
        timestamp: DateTime<Utc>,
    },

    /// A tool was executed
    ToolExecuted {
        tool_name: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// A run reached a terminal state
    RunFinished {
        agent: String,
        state: AgentState,
        steps: usize,
        timestamp: DateTime<Utc>,
    },
}

impl DomainEvent {
    /// Short event name, used as the SSE event type.
    pub fn name(&self) -> &'static str {
        match self {
            Self::RunStarted { .. } => "run_started",
            Self::StepCompleted { .. } => "step_completed",
            Self::StallDetected { .. } => "stall_detected",
            Self::ToolExecuted { .. } => "tool_executed",
            Self::RunFinished { .. } => "run_finished",
        }
    }
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
