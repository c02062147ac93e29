//! ToolContext - execution context for tools

use std::path::{Path, PathBuf};
use tracing::debug;

use super::{Sandbox, ToolError};

/// Execution context for tools - scoped to a single session
///
/// Built by the dispatcher from the fixed sandbox root, never from model
/// arguments. Tools reach the filesystem only through [`ToolContext::resolve`].
#[derive(Debug, Clone)]
pub struct ToolContext {
    /// Sandbox all file and process operations are constrained to
    sandbox: Sandbox,

    /// Session identifier (for log correlation)
    pub session_id: String,
}

impl ToolContext {
    /// Create a new tool context
    pub fn new(sandbox: Sandbox, session_id: impl Into<String>) -> Self {
        let session_id = session_id.into();
        debug!(root = ?sandbox.root(), %session_id, "ToolContext::new: called");
        Self { sandbox, session_id }
    }

    /// Canonical sandbox root
    pub fn root(&self) -> &Path {
        self.sandbox.root()
    }

    /// Resolve a model-supplied relative path inside the sandbox
    pub fn resolve(&self, relative: &str) -> Result<PathBuf, ToolError> {
        self.sandbox.resolve(relative)
    }
}
