//! ConversationLoop - drives model rounds and tool dispatch to a terminal state

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::{LoopConfig, Transcript};
use crate::llm::{CompletionRequest, CompletionResponse, ContentBlock, LlmClient, LlmError, Message, TokenUsage};
use crate::tools::ToolDispatcher;

/// Where a session stands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopState {
    /// Still taking rounds
    Running,
    /// The model produced a final plain-text answer
    Answered(String),
    /// The round budget ran out without an answer
    Exhausted,
    /// A model call failed; carries the error text
    Aborted(String),
}

impl LoopState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, LoopState::Running)
    }

    /// Final answer, only when Answered
    pub fn answer(&self) -> Option<&str> {
        match self {
            LoopState::Answered(text) => Some(text),
            _ => None,
        }
    }
}

/// Outcome of a session
#[derive(Debug, Clone)]
pub struct LoopReport {
    /// Terminal state
    pub state: LoopState,

    /// Rounds actually taken
    pub rounds: u32,

    /// Token usage summed over every model call
    pub usage: TokenUsage,

    /// Every turn of the conversation
    pub transcript: Transcript,
}

/// Multi-turn tool-calling conversation bounded by a round budget
pub struct ConversationLoop<'a> {
    llm: Arc<dyn LlmClient>,
    dispatcher: ToolDispatcher<'a>,
    config: LoopConfig,
}

impl<'a> ConversationLoop<'a> {
    pub fn new(llm: Arc<dyn LlmClient>, dispatcher: ToolDispatcher<'a>, config: LoopConfig) -> Self {
        debug!(max_rounds = config.max_rounds, "ConversationLoop::new: called");
        Self {
            llm,
            dispatcher,
            config,
        }
    }

    /// Run a session for `prompt` until it reaches a terminal state
    ///
    /// Never returns [`LoopState::Running`]. Model errors end the session in
    /// [`LoopState::Aborted`] without a retry.
    pub async fn run(&self, prompt: &str) -> LoopReport {
        debug!(prompt_len = prompt.len(), "ConversationLoop::run: called");
        let mut transcript = Transcript::new(prompt);
        let mut usage = TokenUsage::default();
        let mut state = LoopState::Running;
        let mut rounds = 0;

        while rounds < self.config.max_rounds {
            rounds += 1;
            state = self.run_round(rounds, &mut transcript, &mut usage).await;
            if state.is_terminal() {
                break;
            }
        }

        if state == LoopState::Running {
            warn!(rounds, "Maximum iterations reached without a final response");
            state = LoopState::Exhausted;
        }

        info!(
            rounds,
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            state = ?state,
            "Session finished"
        );

        LoopReport {
            state,
            rounds,
            usage,
            transcript,
        }
    }

    /// One round: model call, assistant turn, then tools or an answer
    async fn run_round(&self, round: u32, transcript: &mut Transcript, usage: &mut TokenUsage) -> LoopState {
        debug!(round, turns = transcript.len(), "ConversationLoop::run_round: called");

        let response = match self.call_model(transcript).await {
            Ok(response) => response,
            Err(e) => {
                error!(round, error = %e, "Model call failed, aborting session");
                return LoopState::Aborted(e.to_string());
            }
        };
        usage.add(&response.usage);

        transcript.push(assistant_turn(&response));

        if !response.tool_calls.is_empty() {
            debug!(round, tool_calls = response.tool_calls.len(), "ConversationLoop::run_round: dispatching tools");
            let results = self.dispatcher.dispatch_all(&response.tool_calls).await;
            let blocks = response
                .tool_calls
                .iter()
                .zip(results)
                .map(|(call, (name, result))| {
                    ContentBlock::tool_result(call.id.clone(), name, result.content(), result.is_error())
                })
                .collect();
            transcript.push(Message::tool_results(blocks));
            return LoopState::Running;
        }

        if let Some(text) = response.text() {
            debug!(round, "ConversationLoop::run_round: final answer");
            return LoopState::Answered(text.to_string());
        }

        warn!(round, "Model reply carried neither text nor tool calls");
        LoopState::Running
    }

    async fn call_model(&self, transcript: &Transcript) -> Result<CompletionResponse, LlmError> {
        let request = CompletionRequest {
            system_prompt: self.config.system_prompt.clone(),
            messages: transcript.turns().to_vec(),
            tools: self.dispatcher.schemas(),
            max_tokens: self.config.max_tokens,
        };

        match tokio::time::timeout(self.config.model_timeout, self.llm.complete(request)).await {
            Ok(result) => result,
            Err(_) => Err(LlmError::Timeout(self.config.model_timeout)),
        }
    }
}

/// The model's reply as a transcript turn, text first then tool calls
fn assistant_turn(response: &CompletionResponse) -> Message {
    let text = response.content.clone().unwrap_or_default();
    if response.tool_calls.is_empty() {
        return Message::assistant(text);
    }

    let mut blocks = Vec::with_capacity(response.tool_calls.len() + 1);
    if !text.is_empty() {
        blocks.push(ContentBlock::text(text));
    }
    blocks.extend(response.tool_calls.iter().map(|call| ContentBlock::ToolUse {
        id: call.id.clone(),
        name: call.name.clone(),
        input: call.input.clone(),
    }));
    Message::assistant_blocks(blocks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::client::mock::MockLlmClient;
    use crate::llm::{Role, ToolCall};
    use crate::tools::{Sandbox, ToolContext, ToolRegistry};
    use async_trait::async_trait;
    use serde_json::json;
    use std::fs;
    use std::time::Duration;
    use tempfile::{TempDir, tempdir};

    fn text(s: &str) -> CompletionResponse {
        CompletionResponse {
            content: Some(s.to_string()),
            tool_calls: vec![],
            usage: TokenUsage {
                input_tokens: 10,
                output_tokens: 2,
            },
        }
    }

    fn calls(calls: Vec<(&str, serde_json::Value)>) -> CompletionResponse {
        CompletionResponse {
            content: None,
            tool_calls: calls
                .into_iter()
                .enumerate()
                .map(|(i, (name, input))| ToolCall {
                    id: format!("call_{}", i),
                    name: name.to_string(),
                    input,
                })
                .collect(),
            usage: TokenUsage {
                input_tokens: 10,
                output_tokens: 2,
            },
        }
    }

    fn sandbox() -> (TempDir, ToolContext) {
        let temp = tempdir().unwrap();
        let ctx = ToolContext::new(Sandbox::new(temp.path()).unwrap(), "test");
        (temp, ctx)
    }

    /// Client that never answers within any reasonable timeout
    struct StalledClient;

    #[async_trait]
    impl LlmClient for StalledClient {
        async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(CompletionResponse::default())
        }
    }

    #[tokio::test]
    async fn test_plain_text_reply_is_answered() {
        let (_temp, ctx) = sandbox();
        let registry = ToolRegistry::default();
        let llm = Arc::new(MockLlmClient::new(vec![text("All done")]));
        let engine = ConversationLoop::new(llm.clone(), ToolDispatcher::new(&registry, ctx), LoopConfig::default());

        let report = engine.run("hello").await;

        assert_eq!(report.state, LoopState::Answered("All done".to_string()));
        assert_eq!(report.rounds, 1);
        assert_eq!(report.transcript.len(), 2);
        assert_eq!(llm.call_count(), 1);
    }

    #[tokio::test]
    async fn test_tool_round_then_answer() {
        let (temp, ctx) = sandbox();
        let registry = ToolRegistry::default();
        let llm = Arc::new(MockLlmClient::new(vec![
            calls(vec![("write_file", json!({"file_path": "out/a.txt", "content": "hi"}))]),
            text("Wrote the file"),
        ]));
        let engine = ConversationLoop::new(llm.clone(), ToolDispatcher::new(&registry, ctx), LoopConfig::default());

        let report = engine.run("write a file").await;

        assert_eq!(report.state.answer(), Some("Wrote the file"));
        assert_eq!(fs::read_to_string(temp.path().join("out/a.txt")).unwrap(), "hi");

        let roles: Vec<Role> = report.transcript.turns().iter().map(|t| t.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::Tool, Role::Assistant]);
        assert_eq!(report.usage.input_tokens, 20);
        assert_eq!(report.usage.output_tokens, 4);
    }

    #[tokio::test]
    async fn test_each_request_carries_full_transcript_and_schemas() {
        let (_temp, ctx) = sandbox();
        let registry = ToolRegistry::default();
        let llm = Arc::new(MockLlmClient::new(vec![
            calls(vec![("get_files_info", json!({}))]),
            text("Empty"),
        ]));
        let engine = ConversationLoop::new(llm.clone(), ToolDispatcher::new(&registry, ctx), LoopConfig::default());

        engine.run("what is here?").await;

        let requests = llm.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].messages.len(), 1);
        assert_eq!(requests[1].messages.len(), 3);
        assert_eq!(requests[1].messages[..1], requests[0].messages[..]);
        assert_eq!(requests[0].tools, registry.schemas());
    }

    #[tokio::test]
    async fn test_multiple_calls_become_one_tool_turn_in_order() {
        let (temp, ctx) = sandbox();
        fs::write(temp.path().join("a.txt"), "alpha").unwrap();
        let registry = ToolRegistry::default();
        let llm = Arc::new(MockLlmClient::new(vec![
            calls(vec![
                ("get_file_content", json!({"file_path": "a.txt"})),
                ("nope", json!({})),
                ("get_files_info", json!({})),
            ]),
            text("ok"),
        ]));
        let engine = ConversationLoop::new(llm, ToolDispatcher::new(&registry, ctx), LoopConfig::default());

        let report = engine.run("go").await;

        let tool_turn = &report.transcript.turns()[2];
        assert_eq!(tool_turn.role, Role::Tool);
        let blocks = tool_turn.blocks();
        assert_eq!(blocks.len(), 3);

        let ids: Vec<&str> = blocks
            .iter()
            .map(|b| match b {
                ContentBlock::ToolResult { tool_use_id, .. } => tool_use_id.as_str(),
                other => panic!("unexpected block {:?}", other),
            })
            .collect();
        assert_eq!(ids, vec!["call_0", "call_1", "call_2"]);
        assert!(matches!(&blocks[0], ContentBlock::ToolResult { content, is_error: false, .. } if content == "alpha"));
        assert!(matches!(&blocks[1], ContentBlock::ToolResult { content, is_error: true, .. } if content.contains("nope")));
    }

    #[tokio::test]
    async fn test_text_alongside_tool_calls_is_not_an_answer() {
        let (_temp, ctx) = sandbox();
        let registry = ToolRegistry::default();
        let mut first = calls(vec![("get_files_info", json!({}))]);
        first.content = Some("Let me check".to_string());
        let llm = Arc::new(MockLlmClient::new(vec![first, text("Nothing here")]));
        let engine = ConversationLoop::new(llm, ToolDispatcher::new(&registry, ctx), LoopConfig::default());

        let report = engine.run("look").await;

        assert_eq!(report.state.answer(), Some("Nothing here"));
        assert_eq!(report.rounds, 2);
        assert_eq!(report.transcript.turns()[1].blocks()[0], ContentBlock::text("Let me check"));
    }

    #[tokio::test]
    async fn test_silent_model_exhausts_exactly_twenty_rounds() {
        let (_temp, ctx) = sandbox();
        let registry = ToolRegistry::default();
        let llm = Arc::new(MockLlmClient::new(vec![CompletionResponse::default(); 25]));
        let engine = ConversationLoop::new(llm.clone(), ToolDispatcher::new(&registry, ctx), LoopConfig::default());

        let report = engine.run("say nothing").await;

        assert_eq!(report.state, LoopState::Exhausted);
        assert_eq!(report.state.answer(), None);
        assert_eq!(report.rounds, 20);
        assert_eq!(llm.call_count(), 20);
        assert_eq!(report.transcript.len(), 21);
    }

    #[tokio::test]
    async fn test_endless_tool_calls_exhaust_budget() {
        let (_temp, ctx) = sandbox();
        let registry = ToolRegistry::default();
        let llm = Arc::new(MockLlmClient::new(vec![calls(vec![("get_files_info", json!({}))]); 10]));
        let config = LoopConfig::default().with_max_rounds(3);
        let engine = ConversationLoop::new(llm.clone(), ToolDispatcher::new(&registry, ctx), config);

        let report = engine.run("loop forever").await;

        assert_eq!(report.state, LoopState::Exhausted);
        assert_eq!(llm.call_count(), 3);
        assert_eq!(report.transcript.count(Role::Tool), 3);
    }

    #[tokio::test]
    async fn test_model_error_aborts_without_retry() {
        let (_temp, ctx) = sandbox();
        let registry = ToolRegistry::default();
        let llm = Arc::new(MockLlmClient::new(vec![calls(vec![("get_files_info", json!({}))])]));
        let engine = ConversationLoop::new(llm.clone(), ToolDispatcher::new(&registry, ctx), LoopConfig::default());

        let report = engine.run("hi").await;

        assert!(matches!(report.state, LoopState::Aborted(ref e) if e.contains("No more mock responses")));
        assert_eq!(report.state.answer(), None);
        assert_eq!(report.rounds, 2);
        assert_eq!(llm.call_count(), 2);
        // Turns from the completed round survive the abort
        assert_eq!(report.transcript.len(), 3);
    }

    #[tokio::test]
    async fn test_model_timeout_aborts() {
        let (_temp, ctx) = sandbox();
        let registry = ToolRegistry::default();
        let config = LoopConfig {
            model_timeout: Duration::from_millis(50),
            ..Default::default()
        };
        let engine = ConversationLoop::new(Arc::new(StalledClient), ToolDispatcher::new(&registry, ctx), config);

        let report = engine.run("hi").await;

        assert!(matches!(report.state, LoopState::Aborted(ref e) if e.contains("Timeout")));
        assert_eq!(report.rounds, 1);
        assert_eq!(report.transcript.len(), 1);
    }

    #[tokio::test]
    async fn test_zero_budget_is_exhausted_without_calls() {
        let (_temp, ctx) = sandbox();
        let registry = ToolRegistry::default();
        let llm = Arc::new(MockLlmClient::new(vec![text("never sent")]));
        let config = LoopConfig::default().with_max_rounds(0);
        let engine = ConversationLoop::new(llm.clone(), ToolDispatcher::new(&registry, ctx), config);

        let report = engine.run("hi").await;

        assert_eq!(report.state, LoopState::Exhausted);
        assert_eq!(llm.call_count(), 0);
    }

    #[test]
    fn test_assistant_turn_keeps_text_and_calls() {
        let mut response = calls(vec![("get_files_info", json!({}))]);
        response.content = Some("Checking".to_string());

        let turn = assistant_turn(&response);

        assert_eq!(turn.role, Role::Assistant);
        let blocks = turn.blocks();
        assert_eq!(blocks[0], ContentBlock::text("Checking"));
        assert!(matches!(&blocks[1], ContentBlock::ToolUse { name, .. } if name == "get_files_info"));
    }
}
