//! Date/time tool: current local date and time.

use async_trait::async_trait;
use std::fmt::Write;
use wayfarer_core::error::ToolError;
use wayfarer_core::tool::{Tool, ToolResult};

const DEFAULT_FORMAT: &str = "%Y-%m-%d %H:%M:%S %:z";

pub struct DateTimeTool;

#[async_trait]
impl Tool for DateTimeTool {
    fn name(&self) -> &str {
        "date_time"
    }

    fn description(&self) -> &str {
        "Get the current local date and time. Useful for planning around today's date."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "format": {
                    "type": "string",
                    "description": "Optional strftime format, e.g. '%Y-%m-%d'. Defaults to '%Y-%m-%d %H:%M:%S %:z'"
                }
            }
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let format = arguments["format"].as_str().unwrap_or(DEFAULT_FORMAT);
        let now = chrono::Local::now();

        // chrono reports a bad specifier as a fmt::Error while rendering
        let mut output = String::new();
        write!(output, "{}", now.format(format)).map_err(|_| {
            ToolError::InvalidArguments(format!("Invalid date format: {format}"))
        })?;

        Ok(ToolResult::ok(output))
    }
}
