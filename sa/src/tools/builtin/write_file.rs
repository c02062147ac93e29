//! write_file tool - write content to a file

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::tools::{ParameterType, Tool, ToolContext, ToolError, ToolParameter, ToolSchema};

/// Write content to a file, creating parent directories as needed
///
/// Not atomic: a crash mid-write can leave a partially written file.
pub struct WriteFileTool;

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &'static str {
        "write_file"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::new(
            self.name(),
            "Writes the given content to the specified file path, creating the file if it does not exist. The path is relative to the working directory",
        )
        .with_parameter(ToolParameter::required(
            "file_path",
            ParameterType::String,
            "The file path you will write the content to, relative to the working directory.",
        ))
        .with_parameter(ToolParameter::required(
            "content",
            ParameterType::String,
            "The text content to write to the file. If the file does not exist, it will be created; otherwise, it will be overwritten",
        ))
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<String, ToolError> {
        debug!(?input, "WriteFileTool::execute: called");
        let path = input["file_path"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArgument("file_path is required".to_string()))?;
        let content = input["content"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArgument("content is required".to_string()))?;
        debug!(%path, content_len = %content.len(), "WriteFileTool::execute: parameters found");

        let full_path = ctx.resolve(path)?;

        if tokio::fs::metadata(&full_path).await.is_ok_and(|m| m.is_dir()) {
            debug!(?full_path, "WriteFileTool::execute: target is a directory");
            return Err(ToolError::IsADirectory { path: path.to_string() });
        }

        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        debug!("WriteFileTool::execute: parent directories ensured");

        tokio::fs::write(&full_path, content).await?;

        let chars = content.chars().count();
        debug!(%chars, "WriteFileTool::execute: file written successfully");
        Ok(format!("Successfully wrote to \"{}\" ({} characters written)", path, chars))
    }
}
