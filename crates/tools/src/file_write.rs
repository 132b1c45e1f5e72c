//! File write tool: saves generated content under the output directory.
//!
//! Paths are always relative to the configured output directory. Absolute
//! paths and `..` components are refused, so the model cannot write
//! anywhere else on disk.

use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use wayfarer_core::error::ToolError;
use wayfarer_core::tool::{Tool, ToolResult};

pub struct FileWriteTool {
    output_dir: PathBuf,
}

impl FileWriteTool {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Resolve a model-supplied relative path inside the output directory.
    fn resolve(&self, relative: &str) -> Result<PathBuf, ToolError> {
        let candidate = Path::new(relative);
        if relative.trim().is_empty() {
            return Err(ToolError::InvalidArguments("'path' must not be empty".into()));
        }

        for component in candidate.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(ToolError::PermissionDenied {
                        tool_name: "file_write".into(),
                        reason: format!("path '{relative}' escapes the output directory"),
                    });
                }
            }
        }

        Ok(self.output_dir.join(candidate))
    }
}

#[async_trait]
impl Tool for FileWriteTool {
    fn name(&self) -> &str {
        "file_write"
    }

    fn description(&self) -> &str {
        "Save content (a plan, a report, an HTML page) to a file in the output directory. \
         Creates the file if it doesn't exist, overwrites if it does."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Relative file path inside the output directory, e.g. 'lisbon/plan.html'"
                },
                "content": {
                    "type": "string",
                    "description": "The content to write"
                }
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let path = arguments["path"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'path' argument".into()))?;

        let content = arguments["content"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'content' argument".into()))?;

        let target = self.resolve(path)?;

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ToolError::ExecutionFailed {
                    tool_name: "file_write".into(),
                    reason: format!("Failed to create directory: {e}"),
                })?;
        }

        tokio::fs::write(&target, content)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "file_write".into(),
                reason: format!("Failed to write file: {e}"),
            })?;

        tracing::debug!(path = %target.display(), bytes = content.len(), "File written");
        Ok(ToolResult::ok(format!(
            "Successfully wrote {} bytes to {}",
            content.len(),
            target.display()
        )))
    }
}
