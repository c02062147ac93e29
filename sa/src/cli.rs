//! CLI definition

use clap::Parser;
use std::path::PathBuf;

use crate::config::Config;

/// SandAgent - let a model work inside one sandboxed directory
#[derive(Debug, Parser)]
#[command(
    name = "sa",
    about = "Tool-calling agent confined to a sandbox directory",
    version = env!("CARGO_PKG_VERSION"),
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(short = 'l', long = "log-level", help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)")]
    pub log_level: Option<String>,

    /// Show the prompt, tool arguments, tool results and token usage
    #[arg(short, long)]
    pub verbose: bool,

    /// Sandbox root (overrides sandbox.root in config)
    #[arg(short, long, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Round budget (overrides agent.max-rounds in config)
    #[arg(short = 'm', long = "max-rounds", value_name = "N")]
    pub max_rounds: Option<u32>,

    /// What to ask the agent
    #[arg(value_name = "PROMPT", required = true, num_args = 1..)]
    pub prompt: Vec<String>,
}

impl Cli {
    /// Prompt words joined with single spaces
    pub fn prompt_text(&self) -> String {
        self.prompt.join(" ")
    }

    /// Apply command-line overrides on top of the loaded config
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(root) = &self.root {
            config.sandbox.root = root.clone();
        }
        if let Some(max_rounds) = self.max_rounds {
            config.agent.max_rounds = max_rounds;
        }
        if let Some(level) = &self.log_level {
            config.log_level = Some(level.clone());
        }
    }
}
