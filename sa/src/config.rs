//! Sandagent configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::llm::LlmError;
use crate::tools::ScriptRunner;

/// Main Sandagent configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level for the log file (overridden by --log-level)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,

    /// LLM provider configuration
    pub llm: LlmConfig,

    /// Sandbox and tool configuration
    pub sandbox: SandboxConfig,

    /// Conversation loop configuration
    pub agent: AgentConfig,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Checks that the API key environment variable is set and the sandbox
    /// root exists. Call this early in startup to fail fast.
    pub fn validate(&self) -> Result<()> {
        self.llm.get_api_key()?;

        if !self.sandbox.root.is_dir() {
            return Err(eyre::eyre!(
                "Sandbox root {} does not exist or is not a directory",
                self.sandbox.root.display()
            ));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Project-local config: .sandagent.yml
        let local_config = PathBuf::from(".sandagent.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // User config: ~/.config/sandagent/sandagent.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("sandagent").join("sandagent.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name ("gemini" or "openai")
    pub provider: String,

    /// Model identifier
    pub model: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Maximum tokens per response
    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,

    /// HTTP request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl LlmConfig {
    /// Read the API key from the configured environment variable
    pub fn get_api_key(&self) -> Result<String, LlmError> {
        match std::env::var(&self.api_key_env) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(LlmError::MissingApiKey {
                env: self.api_key_env.clone(),
            }),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            model: "gemini-2.0-flash-001".to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            max_tokens: 8192,
            timeout_ms: 300_000,
        }
    }
}

/// Sandbox root and tool limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Directory every tool call is confined to
    pub root: PathBuf,

    /// Interpreter used to run scripts
    pub interpreter: String,

    /// Extension a runnable script must carry
    #[serde(rename = "script-extension")]
    pub script_extension: String,

    /// Wall-clock budget for one script run
    #[serde(rename = "timeout-secs")]
    pub timeout_secs: u64,

    /// Read truncation limit in characters
    #[serde(rename = "max-read-chars")]
    pub max_read_chars: usize,
}

impl SandboxConfig {
    /// Script runner for this sandbox
    pub fn script_runner(&self) -> ScriptRunner {
        ScriptRunner::new(
            &self.interpreter,
            &self.script_extension,
            Duration::from_secs(self.timeout_secs),
        )
    }
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./calculator"),
            interpreter: "python3".to_string(),
            script_extension: "py".to_string(),
            timeout_secs: crate::tools::DEFAULT_TIMEOUT_SECS,
            max_read_chars: crate::tools::builtin::DEFAULT_MAX_CHARS,
        }
    }
}

/// Conversation loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Round budget
    #[serde(rename = "max-rounds")]
    pub max_rounds: u32,

    /// Timeout for one model call, in milliseconds
    #[serde(rename = "model-timeout-ms")]
    pub model_timeout_ms: u64,

    /// System prompt sent with every request
    #[serde(rename = "system-prompt")]
    pub system_prompt: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_rounds: 20,
            model_timeout_ms: 300_000,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

/// Default system prompt
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI coding agent.

When a user asks a question or makes a request, make a function call plan. You can perform the following operations:

- List files and directories
- Read file contents
- Execute Python files with optional arguments
- Write or overwrite files

All paths you provide should be relative to the working directory. You do not need to specify the working directory in your function calls as it is automatically injected for security reasons.";
