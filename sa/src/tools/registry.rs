//! ToolRegistry - name to implementation and schema

use std::collections::HashMap;

use tracing::debug;

use super::builtin::{DEFAULT_MAX_CHARS, ListDirectoryTool, ReadFileTool, RunScriptTool, WriteFileTool};
use super::{ScriptRunner, Tool, ToolError, ToolSchema};

/// Registry of the tools a session may call
///
/// Keyed by [`Tool::name`], so the advertised schema set is always exactly
/// the set of callable names. Lookups are exact and case-sensitive.
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    /// Create registry with the four sandbox tools
    pub fn standard(max_read_chars: usize, runner: ScriptRunner) -> Self {
        debug!(max_read_chars, ?runner, "ToolRegistry::standard: called");
        let mut registry = Self::empty();

        registry.insert(Box::new(ListDirectoryTool));
        registry.insert(Box::new(ReadFileTool::new(max_read_chars)));
        registry.insert(Box::new(RunScriptTool::new(runner)));
        registry.insert(Box::new(WriteFileTool));

        debug_assert!(registry.is_consistent());
        registry
    }

    /// Create an empty registry (for testing)
    pub fn empty() -> Self {
        Self { tools: HashMap::new() }
    }

    /// Add a tool, rejecting duplicates and schema/name mismatches
    pub fn register(&mut self, tool: Box<dyn Tool>) -> Result<(), ToolError> {
        let name = tool.name();
        debug!(%name, "ToolRegistry::register: called");

        if self.tools.contains_key(name) {
            return Err(ToolError::DuplicateTool { name: name.to_string() });
        }

        let schema_name = tool.schema().name;
        if schema_name != name {
            return Err(ToolError::InvalidArgument(format!(
                "schema name '{}' does not match tool name '{}'",
                schema_name, name
            )));
        }

        self.insert(tool);
        Ok(())
    }

    fn insert(&mut self, tool: Box<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Look up a tool by exact name
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// Schemas for the model, sorted by name
    pub fn schemas(&self) -> Vec<ToolSchema> {
        let mut schemas: Vec<ToolSchema> = self.tools.values().map(|t| t.schema()).collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }

    /// Check if a tool exists
    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Get tool names, sorted
    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Every key equals its tool's name and schema name
    pub fn is_consistent(&self) -> bool {
        self.tools
            .iter()
            .all(|(key, tool)| key == tool.name() && tool.schema().name == *key)
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::standard(DEFAULT_MAX_CHARS, ScriptRunner::python())
    }
}
