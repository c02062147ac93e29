//! Tool trait definition

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::context::ToolContext;
use super::{ToolError, ToolSchema};

/// A tool that can be called by the LLM
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name (matches the function name the model calls)
    fn name(&self) -> &'static str;

    /// Declarative schema advertised to the model
    fn schema(&self) -> ToolSchema;

    /// Execute the tool
    ///
    /// `input` has already been validated against [`Tool::schema`].
    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<String, ToolError>;
}

/// Uniform result envelope returned for every tool invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolResult {
    Success(String),
    Failure(String),
}

impl ToolResult {
    /// Create a successful result
    pub fn success(content: impl Into<String>) -> Self {
        debug!("ToolResult::success: called");
        ToolResult::Success(content.into())
    }

    /// Create an error result
    pub fn error(content: impl Into<String>) -> Self {
        debug!("ToolResult::error: called");
        ToolResult::Failure(content.into())
    }

    /// Whether this is a failure
    pub fn is_error(&self) -> bool {
        matches!(self, ToolResult::Failure(_))
    }

    /// Payload or failure message
    pub fn content(&self) -> &str {
        match self {
            ToolResult::Success(content) | ToolResult::Failure(content) => content,
        }
    }
}
