//! SandAgent - tool-calling agent over a sandboxed directory
//!
//! CLI entry point: one prompt, one session, one final answer.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use eyre::{Context, Result};
use tracing::{debug, error, info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use sandagent::cli::Cli;
use sandagent::config::Config;
use sandagent::llm::create_client;
use sandagent::r#loop::{ConversationLoop, LoopConfig, LoopState};
use sandagent::tools::{Sandbox, ToolContext, ToolDispatcher, ToolRegistry};

/// Exit status after Ctrl-C
const EXIT_INTERRUPTED: u8 = 130;

fn parse_level(level: Option<&str>) -> tracing::Level {
    match level.map(|s| s.to_uppercase()) {
        None => tracing::Level::INFO,
        Some(s) => match s.as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
    }
}

/// Full log to a file, progress lines to stderr
fn setup_logging(log_level: Option<&str>) -> Result<PathBuf> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sandagent")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let level = parse_level(log_level);
    let log_path = log_dir.join("sandagent.log");
    let log_file = fs::File::create(&log_path).context("Failed to create log file")?;

    let file_layer = fmt::layer()
        .with_writer(log_file)
        .with_ansi(false)
        .with_filter(EnvFilter::from_default_env().add_directive(level.into()));

    let stderr_layer = fmt::layer()
        .compact()
        .without_time()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new("sandagent=info"));

    tracing_subscriber::registry()
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    debug!(?level, "Logging initialized");
    Ok(log_path)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    cli.apply_overrides(&mut config);

    let log_path = setup_logging(config.log_level.as_deref()).context("Failed to setup logging")?;
    debug!(log = %log_path.display(), ?config, "main: configuration loaded");

    config.validate().context("Invalid configuration")?;

    run_session(&cli, &config).await
}

async fn run_session(cli: &Cli, config: &Config) -> Result<ExitCode> {
    let prompt = cli.prompt_text();
    debug!(prompt_len = prompt.len(), verbose = cli.verbose, "run_session: called");

    let sandbox = Sandbox::new(&config.sandbox.root)
        .context(format!("Invalid sandbox root {}", config.sandbox.root.display()))?;
    info!(root = %sandbox.root().display(), "Sandbox ready");

    let registry = ToolRegistry::standard(config.sandbox.max_read_chars, config.sandbox.script_runner());
    let llm = create_client(&config.llm).context("Failed to create LLM client")?;

    let ctx = ToolContext::new(sandbox, format!("sa-{}", std::process::id()));
    let dispatcher = ToolDispatcher::new(&registry, ctx).with_verbose(cli.verbose);
    let engine = ConversationLoop::new(llm, dispatcher, LoopConfig::from_config(config));

    if cli.verbose {
        println!("User prompt: {}", prompt);
    }

    // Dropping the session future kills any running script's process group
    let report = tokio::select! {
        report = engine.run(&prompt) => report,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, cancelling session");
            eprintln!("Interrupted");
            return Ok(ExitCode::from(EXIT_INTERRUPTED));
        }
    };

    if cli.verbose {
        println!("Prompt tokens: {}", report.usage.input_tokens);
        println!("Response tokens: {}", report.usage.output_tokens);
    }

    match report.state {
        LoopState::Answered(text) => {
            println!("Final response:");
            println!("{}", text);
            Ok(ExitCode::SUCCESS)
        }
        LoopState::Exhausted => {
            eprintln!("maximum iterations reached ({} rounds) without a final response", report.rounds);
            Ok(ExitCode::SUCCESS)
        }
        LoopState::Aborted(e) => {
            eprintln!("Error: session aborted in round {}: {}", report.rounds, e);
            Ok(ExitCode::FAILURE)
        }
        LoopState::Running => {
            error!("Session returned without a terminal state");
            Ok(ExitCode::FAILURE)
        }
    }
}
