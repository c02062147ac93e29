//! Gemini API client implementation
//!
//! Implements the LlmClient trait for the Gemini `generateContent` endpoint
//! with function calling.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use super::retry::RetryPolicy;
use super::{CompletionRequest, CompletionResponse, ContentBlock, LlmClient, LlmError, Message, Role, TokenUsage, ToolCall};
use crate::config::LlmConfig;
use crate::tools::ToolSchema;

/// Gemini API client
pub struct GeminiClient {
    model: String,
    api_key: String,
    base_url: String,
    http: Client,
    max_tokens: u32,
    retry: RetryPolicy,
}

impl GeminiClient {
    /// Create a new client from configuration
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        debug!(model = %config.model, base_url = %config.base_url, "GeminiClient::from_config: called");
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

    fn endpoint(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model)
    }

    /// Build the request body for the Gemini API
    fn build_request_body(&self, request: &CompletionRequest) -> Value {
        debug!(%self.model, %request.max_tokens, "GeminiClient::build_request_body: called");

        let mut body = json!({
            "contents": convert_messages(&request.messages),
            "generationConfig": {
                "maxOutputTokens": request.max_tokens.min(self.max_tokens),
            },
        });

        if !request.system_prompt.is_empty() {
            body["systemInstruction"] = json!({
                "parts": [{ "text": request.system_prompt }],
            });
        }

        if !request.tools.is_empty() {
            let declarations: Vec<Value> = request.tools.iter().map(function_declaration).collect();
            body["tools"] = json!([{ "functionDeclarations": declarations }]);
        }

        body
    }

    /// Parse the Gemini API response
    fn parse_response(&self, api_response: GeminiResponse) -> Result<CompletionResponse, LlmError> {
        let usage = api_response
            .usage_metadata
            .map(|u| TokenUsage {
                input_tokens: u.prompt_token_count,
                output_tokens: u.candidates_token_count,
            })
            .unwrap_or_default();

        let Some(candidate) = api_response.candidates.into_iter().next() else {
            let reason = api_response
                .prompt_feedback
                .and_then(|f| f.block_reason)
                .unwrap_or_else(|| "no candidates".to_string());
            debug!(%reason, "GeminiClient::parse_response: empty response");
            return Err(LlmError::InvalidResponse(format!("Gemini returned no candidates: {}", reason)));
        };

        let parts = candidate.content.map(|c| c.parts).unwrap_or_default();
        let mut text = String::new();
        let mut tool_calls = Vec::new();

        for part in parts {
            if let Some(t) = part.text {
                text.push_str(&t);
            }
            if let Some(call) = part.function_call {
                let id = call.id.unwrap_or_else(|| format!("call_{}", tool_calls.len()));
                tool_calls.push(ToolCall {
                    id,
                    name: call.name,
                    input: call.args.unwrap_or_else(|| json!({})),
                });
            }
        }

        debug!(text_len = text.len(), tool_calls = tool_calls.len(), "GeminiClient::parse_response: parsed");
        Ok(CompletionResponse {
            content: if text.is_empty() { None } else { Some(text) },
            tool_calls,
            usage,
        })
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        debug!(%self.model, messages = request.messages.len(), "GeminiClient::complete: called");
        let url = self.endpoint();
        let body = self.build_request_body(&request);

        let response = self
            .retry
            .send(|| {
                self.http
                    .post(&url)
                    .header("x-goog-api-key", &self.api_key)
                    .header("content-type", "application/json")
                    .json(&body)
            })
            .await?;

        let api_response: GeminiResponse = response.json().await?;
        self.parse_response(api_response)
    }
}

/// Convert transcript turns to Gemini `contents`
///
/// Gemini knows only "user" and "model"; tool turns travel as user turns
/// carrying `functionResponse` parts. Gemini rejects empty parts, so empty
/// text (a degenerate model reply) is left out of the request.
fn convert_messages(messages: &[Message]) -> Vec<Value> {
    debug!(message_count = %messages.len(), "convert_messages: called");
    messages
        .iter()
        .filter_map(|msg| {
            let role = match msg.role {
                Role::User | Role::Tool => "user",
                Role::Assistant => "model",
            };
            let parts: Vec<Value> = msg.blocks().iter().filter_map(convert_block).collect();
            if parts.is_empty() {
                return None;
            }
            Some(json!({ "role": role, "parts": parts }))
        })
        .collect()
}

fn convert_block(block: &ContentBlock) -> Option<Value> {
    let part = match block {
        ContentBlock::Text { text } if text.is_empty() => return None,
        ContentBlock::Text { text } => json!({ "text": text }),
        ContentBlock::ToolUse { name, input, .. } => json!({
            "functionCall": { "name": name, "args": input },
        }),
        ContentBlock::ToolResult {
            name, content, is_error, ..
        } => {
            let key = if *is_error { "error" } else { "result" };
            let mut response = serde_json::Map::new();
            response.insert(key.to_string(), json!(content));
            json!({
                "functionResponse": { "name": name, "response": response },
            })
        }
    };
    Some(part)
}

/// Gemini function declaration for one tool
fn function_declaration(schema: &ToolSchema) -> Value {
    let mut declaration = json!({
        "name": schema.name,
        "description": schema.description,
    });
    if !schema.parameters.is_empty() {
        declaration["parameters"] = uppercase_types(schema.to_json_schema());
    }
    declaration
}

/// Gemini's schema dialect spells types in upper case ("OBJECT", "STRING")
fn uppercase_types(mut value: Value) -> Value {
    match &mut value {
        Value::Object(map) => {
            for (key, v) in map.iter_mut() {
                if key == "type"
                    && let Value::String(s) = v
                {
                    *s = s.to_uppercase();
                } else if key != "required" {
                    *v = uppercase_types(v.take());
                }
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                *item = uppercase_types(item.take());
            }
        }
        _ => {}
    }
    value
}

// Gemini API response types

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    usage_metadata: Option<GeminiUsage>,
    prompt_feedback: Option<GeminiPromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPart {
    text: Option<String>,
    function_call: Option<GeminiFunctionCall>,
}

#[derive(Debug, Deserialize)]
struct GeminiFunctionCall {
    id: Option<String>,
    name: String,
    args: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsage {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPromptFeedback {
    block_reason: Option<String>,
}
