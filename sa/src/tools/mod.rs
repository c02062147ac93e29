//! Tool system for the agent loop
//!
//! Tools provide directory listing, file read/write and script execution to
//! the model. Every call goes through a `ToolDispatcher`, which runs it in a
//! `ToolContext` scoped to the session's sandbox root - tools cannot escape
//! the sandbox.

mod context;
mod dispatcher;
mod error;
mod process;
mod registry;
mod sandbox;
mod schema;
mod traits;

pub mod builtin;

pub use context::ToolContext;
pub use dispatcher::{RESERVED_ROOT_KEY, ToolDispatcher};
pub use error::ToolError;
pub use process::{DEFAULT_TIMEOUT_SECS, ExecutionOutcome, NO_OUTPUT, ScriptRunner};
pub use registry::ToolRegistry;
pub use sandbox::Sandbox;
pub use schema::{ParameterType, ToolParameter, ToolSchema};
pub use traits::{Tool, ToolResult};
