//! SandAgent - tool-calling agent loop over a sandboxed working directory
//!
//! A language model is given four tools (list a directory, read a file,
//! write a file, run a script) that all operate inside a single sandbox
//! root. The conversation loop feeds every tool result back to the model
//! until it answers in plain text or the round budget runs out.
//!
//! # Modules
//!
//! - [`tools`] - Sandbox path guard, built-in tools, registry and dispatcher
//! - [`llm`] - Model client trait, transcript types and HTTP clients
//! - [`r#loop`] - Conversation loop with explicit terminal states
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod cli;
pub mod config;
pub mod llm;
pub mod tools;

// Note: 'loop' is a reserved keyword, so we use r#loop
#[path = "loop/mod.rs"]
pub mod r#loop;

// Re-export commonly used types
pub use config::{AgentConfig, Config, LlmConfig, SandboxConfig};
pub use llm::{LlmClient, LlmError};
pub use r#loop::{ConversationLoop, LoopConfig, LoopReport, LoopState};
pub use tools::{Sandbox, ToolContext, ToolDispatcher, ToolError, ToolRegistry, ToolResult};
