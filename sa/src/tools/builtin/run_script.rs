//! run_python_file tool - execute a script inside the sandbox

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::tools::{ParameterType, ScriptRunner, Tool, ToolContext, ToolError, ToolParameter, ToolSchema};

/// Execute a script file with the configured interpreter
pub struct RunScriptTool {
    runner: ScriptRunner,
}

impl RunScriptTool {
    pub fn new(runner: ScriptRunner) -> Self {
        Self { runner }
    }
}

impl Default for RunScriptTool {
    fn default() -> Self {
        Self::new(ScriptRunner::python())
    }
}

#[async_trait]
impl Tool for RunScriptTool {
    fn name(&self) -> &'static str {
        "run_python_file"
    }

    fn schema(&self) -> ToolSchema {
        let kind = self.runner.kind();
        ToolSchema::new(
            self.name(),
            format!(
                "Executes a {} file within the working directory and returns the output from the interpreter.",
                kind
            ),
        )
        .with_parameter(ToolParameter::required(
            "file_path",
            ParameterType::String,
            format!("Path to the {} file to execute, relative to the working directory.", kind),
        ))
        .with_parameter(ToolParameter::optional(
            "args",
            ParameterType::Array(Box::new(ParameterType::String)),
            format!("Optional arguments to pass to the {} file.", kind),
        ))
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<String, ToolError> {
        debug!(?input, "RunScriptTool::execute: called");
        let path = input["file_path"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArgument("file_path is required".to_string()))?;

        let args: Vec<String> = input["args"]
            .as_array()
            .map(|values| values.iter().filter_map(|v| v.as_str().map(String::from)).collect())
            .unwrap_or_default();

        let outcome = self.runner.run(ctx, path, &args).await?;
        debug!(success = outcome.success(), "RunScriptTool::execute: script finished");
        outcome.into_tool_output(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::Sandbox;
    use std::fs;
    use std::time::Duration;
    use tempfile::tempdir;

    fn sh_tool(timeout: Duration) -> RunScriptTool {
        RunScriptTool::new(ScriptRunner::new("sh", "sh", timeout))
    }

    fn ctx_for(path: &std::path::Path) -> ToolContext {
        ToolContext::new(Sandbox::new(path).unwrap(), "test")
    }

    #[test]
    fn test_default_schema_names_python() {
        let schema = RunScriptTool::default().schema();

        assert_eq!(schema.name, "run_python_file");
        assert!(schema.description.contains("Python"));
        assert!(schema.parameter("file_path").unwrap().required);
        assert!(!schema.parameter("args").unwrap().required);
    }

    #[tokio::test]
    async fn test_run_script_with_args() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("calc.sh"), "echo \"result: $1\"\n").unwrap();
        let ctx = ctx_for(temp.path());

        let result = sh_tool(Duration::from_secs(10))
            .execute(serde_json::json!({"file_path": "calc.sh", "args": ["3 + 5"]}), &ctx)
            .await
            .unwrap();

        assert_eq!(result, "STDOUT: result: 3 + 5\n");
    }

    #[tokio::test]
    async fn test_run_script_failure_is_still_output() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("boom.sh"), "echo oops >&2\nexit 2\n").unwrap();
        let ctx = ctx_for(temp.path());

        let result = sh_tool(Duration::from_secs(10))
            .execute(serde_json::json!({"file_path": "boom.sh"}), &ctx)
            .await
            .unwrap();

        assert_eq!(result, "STDERR: oops\n\nProcess exited with code 2");
    }

    #[tokio::test]
    async fn test_run_script_timeout_is_error() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("slow.sh"), "sleep 30\n").unwrap();
        let ctx = ctx_for(temp.path());

        let err = sh_tool(Duration::from_millis(200))
            .execute(serde_json::json!({"file_path": "slow.sh"}), &ctx)
            .await
            .unwrap_err();

        assert!(matches!(err, ToolError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_run_script_wrong_kind() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("main.py"), "print(1)\n").unwrap();
        let ctx = ctx_for(temp.path());

        let err = sh_tool(Duration::from_secs(10))
            .execute(serde_json::json!({"file_path": "main.py"}), &ctx)
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "\"main.py\" is not a shell file.");
    }
}
