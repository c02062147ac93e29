//! Tool error types

use thiserror::Error;

/// Errors that can occur during tool execution
///
/// Messages are written for the model: they name the caller-supplied
/// relative path, never the resolved absolute one.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Cannot access \"{path}\" as it is outside the permitted working directory")]
    OutsideSandbox { path: String },

    #[error("File not found or is not a regular file: \"{path}\"")]
    NotAFile { path: String },

    #[error("\"{path}\" is not a directory")]
    NotADirectory { path: String },

    #[error("\"{path}\" is a directory, not a file")]
    IsADirectory { path: String },

    #[error("\"{path}\" is not a valid text file (not UTF-8)")]
    InvalidEncoding { path: String },

    #[error("File \"{path}\" not found.")]
    FileNotFound { path: String },

    #[error("\"{path}\" is not a {kind} file.")]
    UnsupportedFileType { path: String, kind: String },

    #[error("Script \"{path}\" timed out after {timeout_secs}s and was killed")]
    Timeout { path: String, timeout_secs: u64 },

    #[error("Unknown function: {name}")]
    UnknownTool { name: String },

    #[error("Tool already registered: {name}")]
    DuplicateTool { name: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
