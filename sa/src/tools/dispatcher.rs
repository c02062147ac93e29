//! ToolDispatcher - turns one tool call into exactly one ToolResult

use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::llm::ToolCall;

use super::{ToolContext, ToolError, ToolRegistry, ToolResult, ToolSchema};

/// Argument key the model must not control; the sandbox comes from the context
pub const RESERVED_ROOT_KEY: &str = "working_directory";

/// Dispatches model tool calls against a registry inside one sandbox
///
/// No error of any kind escapes [`ToolDispatcher::dispatch`]: unknown
/// names, invalid arguments, tool errors and tool panics all become a
/// [`ToolResult::Failure`].
pub struct ToolDispatcher<'a> {
    registry: &'a ToolRegistry,
    ctx: ToolContext,
    verbose: bool,
}

impl<'a> ToolDispatcher<'a> {
    pub fn new(registry: &'a ToolRegistry, ctx: ToolContext) -> Self {
        debug!(tools = registry.len(), root = ?ctx.root(), "ToolDispatcher::new: called");
        Self {
            registry,
            ctx,
            verbose: false,
        }
    }

    /// Also log call arguments and results
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Schemas to advertise to the model
    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.registry.schemas()
    }

    /// Context every call runs in
    pub fn context(&self) -> &ToolContext {
        &self.ctx
    }

    /// Execute a tool call, returning the tool name and its result
    pub async fn dispatch(&self, call: &ToolCall) -> (String, ToolResult) {
        let name = call.name.clone();
        if self.verbose {
            info!(session = %self.ctx.session_id, tool = %name, args = %call.input, "Calling function");
        } else {
            info!(session = %self.ctx.session_id, tool = %name, "Calling function");
        }

        let Some(tool) = self.registry.get(&name) else {
            let err = ToolError::UnknownTool { name: name.clone() };
            warn!(tool = %name, "Model requested an unknown function");
            return (name, ToolResult::error(err.to_string()));
        };

        let input = strip_reserved_keys(call.input.clone());
        let result = match tool.schema().validate(&input) {
            Err(e) => {
                debug!(tool = %name, %e, "ToolDispatcher::dispatch: invalid arguments");
                ToolResult::error(format!("Error executing {}: {}", name, e))
            }
            Ok(()) => match AssertUnwindSafe(tool.execute(input, &self.ctx)).catch_unwind().await {
                Ok(Ok(content)) => ToolResult::success(content),
                Ok(Err(e)) => {
                    debug!(tool = %name, %e, "ToolDispatcher::dispatch: tool returned error");
                    ToolResult::error(format!("Error executing {}: {}", name, e))
                }
                Err(panic) => {
                    let reason = panic_message(panic.as_ref());
                    error!(tool = %name, %reason, "Tool panicked");
                    ToolResult::error(format!("Error executing {}: tool panicked: {}", name, reason))
                }
            },
        };

        if self.verbose {
            info!(tool = %name, is_error = result.is_error(), result = %result.content(), "Function result");
        }

        (name, result)
    }

    /// Execute calls sequentially, in request order
    pub async fn dispatch_all(&self, calls: &[ToolCall]) -> Vec<(String, ToolResult)> {
        let mut results = Vec::with_capacity(calls.len());

        for call in calls {
            results.push(self.dispatch(call).await);
        }

        results
    }
}

fn strip_reserved_keys(mut input: Value) -> Value {
    if let Some(args) = input.as_object_mut()
        && args.remove(RESERVED_ROOT_KEY).is_some()
    {
        warn!("Ignoring model-supplied {}", RESERVED_ROOT_KEY);
    }
    input
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
