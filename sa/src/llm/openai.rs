//! OpenAI API client implementation
//!
//! Implements the LlmClient trait for OpenAI-compatible Chat Completions APIs.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, warn};

use super::retry::RetryPolicy;
use super::{CompletionRequest, CompletionResponse, ContentBlock, LlmClient, LlmError, Message, Role, TokenUsage, ToolCall};
use crate::config::LlmConfig;

/// OpenAI API client
pub struct OpenAIClient {
    model: String,
    api_key: String,
    base_url: String,
    http: Client,
    max_tokens: u32,
    retry: RetryPolicy,
}

impl OpenAIClient {
    /// Create a new client from configuration
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        debug!(model = %config.model, base_url = %config.base_url, "OpenAIClient::from_config: called");
        let api_key = config.get_api_key()?;

        let http = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(LlmError::Network)?;

        Ok(Self {
            model: config.model.clone(),
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http,
            max_tokens: config.max_tokens,
            retry: RetryPolicy::default(),
        })
    }

    /// Build the request body for the OpenAI API
    fn build_request_body(&self, request: &CompletionRequest) -> Value {
        debug!(%self.model, %request.max_tokens, "OpenAIClient::build_request_body: called");

        let mut messages = vec![json!({
            "role": "system",
            "content": request.system_prompt,
        })];

        messages.extend(convert_messages(&request.messages));

        let max_tokens = request.max_tokens.min(self.max_tokens);

        // o-series and gpt-5 models use max_completion_tokens instead of max_tokens
        let uses_completion_tokens =
            self.model.starts_with("gpt-5") || self.model.starts_with("o1") || self.model.starts_with("o3");

        let mut body = json!({
            "model": self.model,
            "messages": messages,
        });

        if uses_completion_tokens {
            body["max_completion_tokens"] = json!(max_tokens);
        } else {
            body["max_tokens"] = json!(max_tokens);
        }

        if !request.tools.is_empty() {
            let tools: Vec<Value> = request
                .tools
                .iter()
                .map(|schema| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": schema.name,
                            "description": schema.description,
                            "parameters": schema.to_json_schema(),
                        }
                    })
                })
                .collect();
            body["tools"] = json!(tools);
            body["tool_choice"] = json!("auto");
        }

        body
    }

    /// Parse the OpenAI API response
    ///
    /// A reply without choices, or with tool-call arguments that are not a
    /// JSON object, is rejected rather than handed to the loop.
    fn parse_response(&self, api_response: OpenAIResponse) -> Result<CompletionResponse, LlmError> {
        let usage = api_response
            .usage
            .map(|u| TokenUsage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        let Some(choice) = api_response.choices.into_iter().next() else {
            warn!("OpenAIClient::parse_response: no choices");
            return Err(LlmError::InvalidResponse("response contained no choices".to_string()));
        };

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| {
                let raw = match tc.function.arguments.trim() {
                    "" => "{}",
                    raw => raw,
                };
                let input: Value = serde_json::from_str(raw).map_err(|e| {
                    warn!(tool = %tc.function.name, error = %e, "Tool call arguments are not valid JSON");
                    LlmError::InvalidResponse(format!(
                        "arguments for tool call '{}' are not valid JSON: {}",
                        tc.function.name, e
                    ))
                })?;
                if !input.is_object() {
                    return Err(LlmError::InvalidResponse(format!(
                        "arguments for tool call '{}' are not a JSON object",
                        tc.function.name
                    )));
                }
                Ok(ToolCall {
                    id: tc.id,
                    name: tc.function.name,
                    input,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(CompletionResponse {
            content: choice.message.content,
            tool_calls,
            usage,
        })
    }
}

#[async_trait]
impl LlmClient for OpenAIClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        debug!(%self.model, messages = request.messages.len(), "OpenAIClient::complete: called");
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = self.build_request_body(&request);

        let response = self
            .retry
            .send(|| {
                self.http
                    .post(&url)
                    .header("Authorization", format!("Bearer {}", self.api_key))
                    .header("content-type", "application/json")
                    .json(&body)
            })
            .await?;

        let api_response: OpenAIResponse = response.json().await?;
        self.parse_response(api_response)
    }
}

/// Convert transcript turns to OpenAI API messages
///
/// OpenAI requires one message per tool result, so a single tool turn with
/// multiple results becomes multiple `role: tool` messages.
fn convert_messages(messages: &[Message]) -> Vec<Value> {
    debug!(message_count = %messages.len(), "convert_messages: called");
    let mut result = Vec::new();

    for msg in messages {
        let mut tool_calls = Vec::new();
        let mut text_content = String::new();

        for block in msg.blocks() {
            match block {
                ContentBlock::Text { text } => text_content.push_str(&text),
                ContentBlock::ToolUse { id, name, input } => {
                    tool_calls.push(json!({
                        "id": id,
                        "type": "function",
                        "function": {
                            "name": name,
                            "arguments": input.to_string(),
                        }
                    }));
                }
                ContentBlock::ToolResult {
                    tool_use_id, content, ..
                } => {
                    result.push(json!({
                        "role": "tool",
                        "tool_call_id": tool_use_id,
                        "content": content,
                    }));
                }
            }
        }

        match msg.role {
            Role::Tool => {}
            Role::Assistant if !tool_calls.is_empty() => {
                let mut message = json!({
                    "role": "assistant",
                    "tool_calls": tool_calls,
                });
                if !text_content.is_empty() {
                    message["content"] = json!(text_content);
                }
                result.push(message);
            }
            Role::Assistant => result.push(json!({ "role": "assistant", "content": text_content })),
            Role::User => result.push(json!({ "role": "user", "content": text_content })),
        }
    }

    result
}

// OpenAI API response types

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    #[serde(default)]
    choices: Vec<OpenAIChoice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIMessage {
    content: Option<String>,
    tool_calls: Option<Vec<OpenAIToolCall>>,
}

#[derive(Debug, Deserialize)]
struct OpenAIToolCall {
    id: String,
    function: OpenAIFunction,
}

#[derive(Debug, Deserialize)]
struct OpenAIFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}
