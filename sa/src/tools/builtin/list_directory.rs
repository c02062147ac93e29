//! get_files_info tool - list directory entries with sizes

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use crate::tools::{ParameterType, Tool, ToolContext, ToolError, ToolParameter, ToolSchema};

/// List entries of a directory inside the sandbox
pub struct ListDirectoryTool;

#[async_trait]
impl Tool for ListDirectoryTool {
    fn name(&self) -> &'static str {
        "get_files_info"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::new(
            self.name(),
            "Lists files in the specified directory along with their sizes, constrained to the working directory.",
        )
        .with_parameter(ToolParameter::optional(
            "directory",
            ParameterType::String,
            "The directory to list files from, relative to the working directory. If not provided, lists files in the working directory itself.",
        ))
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<String, ToolError> {
        debug!(?input, "ListDirectoryTool::execute: called");
        let directory = input["directory"].as_str().unwrap_or(".");
        debug!(%directory, "ListDirectoryTool::execute: directory parameter");

        let full_path = ctx.resolve(directory)?;
        debug!(?full_path, "ListDirectoryTool::execute: path validated");

        let is_dir = tokio::fs::metadata(&full_path)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        if !is_dir {
            debug!("ListDirectoryTool::execute: not a directory");
            return Err(ToolError::NotADirectory {
                path: directory.to_string(),
            });
        }

        let mut lines = Vec::new();
        let mut dir = tokio::fs::read_dir(&full_path).await?;
        while let Some(entry) = dir.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            // follows symlinks, like a size lookup by path would
            match tokio::fs::metadata(entry.path()).await {
                Ok(metadata) => lines.push(format!(
                    "- {}: file_size={} bytes, is_dir={}",
                    name,
                    metadata.len(),
                    metadata.is_dir()
                )),
                Err(e) => {
                    warn!(%name, error = %e, "Failed to read metadata for directory entry");
                    lines.push(format!("- {}: metadata unavailable ({})", name, e));
                }
            }
        }

        debug!(entries_count = %lines.len(), "ListDirectoryTool::execute: entries collected");
        Ok(lines.join("\n"))
    }
}
