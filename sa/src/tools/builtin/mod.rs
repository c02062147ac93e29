//! Built-in sandboxed tools

mod list_directory;
mod read_file;
mod run_script;
mod write_file;

pub use list_directory::ListDirectoryTool;
pub use read_file::{DEFAULT_MAX_CHARS, ReadFileTool};
pub use run_script::RunScriptTool;
pub use write_file::WriteFileTool;
