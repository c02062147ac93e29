//! get_file_content tool - read a text file with a character limit

use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use tokio::io::AsyncReadExt;
use tracing::debug;

use crate::tools::{ParameterType, Tool, ToolContext, ToolError, ToolParameter, ToolSchema};

/// Default number of characters returned before truncating
pub const DEFAULT_MAX_CHARS: usize = 10_000;

/// Read the first `max_chars` characters of a UTF-8 file
pub struct ReadFileTool {
    max_chars: usize,
}

impl ReadFileTool {
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }
}

impl Default for ReadFileTool {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CHARS)
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &'static str {
        "get_file_content"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::new(
            self.name(),
            format!(
                "Reads and returns the first {} characters of the content from a specified file within the working directory.",
                self.max_chars
            ),
        )
        .with_parameter(ToolParameter::required(
            "file_path",
            ParameterType::String,
            "The path to the file whose content should be read, relative to the working directory.",
        ))
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<String, ToolError> {
        debug!(?input, "ReadFileTool::execute: called");
        let path = input["file_path"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArgument("file_path is required".to_string()))?;

        let full_path = ctx.resolve(path)?;

        let is_file = tokio::fs::metadata(&full_path)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false);
        if !is_file {
            debug!(?full_path, "ReadFileTool::execute: not a regular file");
            return Err(ToolError::NotAFile { path: path.to_string() });
        }

        let content = read_limited(&full_path, self.max_chars).await?.ok_or_else(|| {
            debug!("ReadFileTool::execute: invalid UTF-8 in read window");
            ToolError::InvalidEncoding { path: path.to_string() }
        })?;

        if content.chars().count() == self.max_chars {
            debug!(max_chars = self.max_chars, "ReadFileTool::execute: truncating");
            return Ok(format!(
                "{}[...File \"{}\" truncated at {} characters]",
                content, path, self.max_chars
            ));
        }

        Ok(content)
    }
}

/// Read at most `max_chars` characters; `None` if the window is not UTF-8
async fn read_limited(path: &Path, max_chars: usize) -> Result<Option<String>, ToolError> {
    // Enough bytes for max_chars of the widest encoding plus one partial char
    let window = max_chars.saturating_mul(4).saturating_add(4);

    let file = tokio::fs::File::open(path).await?;
    let mut bytes = Vec::new();
    file.take(window as u64).read_to_end(&mut bytes).await?;
    let at_eof = bytes.len() < window;

    Ok(decode_window(&bytes, max_chars, at_eof))
}

fn decode_window(bytes: &[u8], max_chars: usize, at_eof: bool) -> Option<String> {
    let text = match std::str::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => {
            let text = std::str::from_utf8(&bytes[..e.valid_up_to()]).ok()?;
            // A char cut off by the window end is fine once max_chars are decoded
            let cut_by_window = e.error_len().is_none() && !at_eof;
            if !cut_by_window && text.chars().count() < max_chars {
                return None;
            }
            text
        }
    };

    Some(text.chars().take(max_chars).collect())
}
