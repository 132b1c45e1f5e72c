//! Built-in tool implementations for Wayfarer.
//!
//! Tools give the agent the ability to act: end the run, check the
//! current date and time, and write generated content (plans, HTML pages)
//! to disk under a confined output directory.

pub mod date_time;
pub mod file_write;
pub mod terminate;

use std::path::PathBuf;

use wayfarer_core::tool::ToolRegistry;

/// Create a tool registry with all built-in tools.
///
/// `file_write` is confined to `output_dir`.
pub fn default_registry(output_dir: impl Into<PathBuf>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(terminate::TerminateTool));
    registry.register(Box::new(date_time::DateTimeTool));
    registry.register(Box::new(file_write::FileWriteTool::new(output_dir)));
    registry
}
