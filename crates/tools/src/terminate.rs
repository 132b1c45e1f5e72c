//! Terminate tool: lets the model end a run on its own.
//!
//! The tool itself does nothing. Step executors recognize the call by name
//! and mark the run finished.

use async_trait::async_trait;
use wayfarer_core::error::ToolError;
use wayfarer_core::tool::{TERMINATE_TOOL, Tool, ToolResult};

pub struct TerminateTool;

#[async_trait]
impl Tool for TerminateTool {
    fn name(&self) -> &str {
        TERMINATE_TOOL
    }

    fn description(&self) -> &str {
        "Terminate the interaction when the request is met or if the assistant cannot \
         proceed further with the task. When you have finished all the tasks, call this \
         tool to end the work."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn execute(&self, _arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        tracing::info!("Agent requested termination");
        Ok(ToolResult::ok("Task finished"))
    }
}
