//! # Wayfarer Core
//!
//! Domain types, traits, and error definitions for the Wayfarer task agent.
//! This crate has **no framework dependencies**: it defines the model that
//! the engine, the providers, the tools and the gateway are written against.
//!
//! ## Layout
//!
//! - [`message`]: turn records and the per-run conversation context
//! - [`provider`]: the completion service boundary
//! - [`tool`]: the tool dispatcher boundary and the reserved `terminate` name
//! - [`agent`]: run state
//! - [`event`]: broadcast bus for domain events
//! - [`error`]: one error enum per bounded context

pub mod agent;
pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use agent::AgentState;
pub use error::{AgentError, Error, Result};
pub use event::{DomainEvent, EventBus};
pub use message::{Conversation, ConversationId, Message, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse};
pub use tool::{TERMINATE_TOOL, Tool, ToolCall, ToolRegistry, ToolResult};
