//! Loop configuration types

use std::time::Duration;

use tracing::debug;

use crate::config::{Config, DEFAULT_SYSTEM_PROMPT};

/// Settings for one conversation session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopConfig {
    /// Round budget; reaching it without an answer ends in Exhausted
    pub max_rounds: u32,

    /// System prompt sent with every request
    pub system_prompt: String,

    /// Max tokens per model response
    pub max_tokens: u32,

    /// Upper bound on one model call
    pub model_timeout: Duration,
}

fn default_max_rounds() -> u32 {
    20
}

fn default_max_tokens() -> u32 {
    8192
}

fn default_model_timeout() -> Duration {
    Duration::from_millis(300_000)
}

impl LoopConfig {
    /// Build from the application config
    pub fn from_config(config: &Config) -> Self {
        debug!(
            max_rounds = config.agent.max_rounds,
            model_timeout_ms = config.agent.model_timeout_ms,
            "LoopConfig::from_config: called"
        );
        Self {
            max_rounds: config.agent.max_rounds,
            system_prompt: config.agent.system_prompt.clone(),
            max_tokens: config.llm.max_tokens,
            model_timeout: Duration::from_millis(config.agent.model_timeout_ms),
        }
    }

    pub fn with_max_rounds(mut self, max_rounds: u32) -> Self {
        self.max_rounds = max_rounds;
        self
    }
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_rounds: default_max_rounds(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_tokens: default_max_tokens(),
            model_timeout: default_model_timeout(),
        }
    }
}
