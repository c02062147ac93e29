//! Conversation loop module
//!
//! One session: prompt → model → tools → model ... until the model answers in
//! plain text, the round budget runs out, or a model call fails.

mod config;
mod engine;
mod transcript;

pub use config::LoopConfig;
pub use engine::{ConversationLoop, LoopReport, LoopState};
pub use transcript::Transcript;
