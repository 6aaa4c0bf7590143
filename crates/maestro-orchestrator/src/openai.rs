use crate::llm::{ChatMessage, Generation, Role, TextGenerator, ToolSpec};
use async_trait::async_trait;
use maestro_core::{MaestroError, MaestroResult, ToolCall};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

/// Settings for an OpenAI-compatible chat completions endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model name sent with each request.
    #[serde(default = "default_model_id")]
    pub model_id: String,
    /// Bearer key.
    #[serde(default)]
    pub api_key: String,
    /// Base URL up to and including the API version, e.g. `https://openrouter.ai/api/v1`.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Completion token cap.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Overall request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_model_id() -> String {
    "openai/gpt-4o-mini".into()
}

fn default_base_url() -> String {
    "https://openrouter.ai/api/v1".into()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_timeout_secs() -> u64 {
    120
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_id: default_model_id(),
            api_key: String::new(),
            base_url: default_base_url(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// [`TextGenerator`] backed by any OpenAI-compatible API (OpenAI,
/// OpenRouter, Groq, Ollama and similar).
pub struct OpenAiGenerator {
    config: ModelConfig,
    http: reqwest::Client,
}

impl OpenAiGenerator {
    /// Build the HTTP client.
    pub fn new(config: ModelConfig) -> MaestroResult<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| MaestroError::Http(e.to_string()))?;
        Ok(Self { config, http })
    }

    fn build_messages(&self, system_prompt: Option<&str>, messages: &[ChatMessage]) -> Vec<Value> {
        let mut api_messages = Vec::with_capacity(messages.len() + 1);
        if let Some(sys) = system_prompt {
            api_messages.push(json!({"role": "system", "content": sys}));
        }
        for m in messages {
            api_messages.push(match m.role {
                Role::User => json!({"role": "user", "content": m.content}),
                Role::Assistant if !m.tool_calls.is_empty() => json!({
                    "role": "assistant",
                    "content": m.content,
                    "tool_calls": m.tool_calls.iter().map(|c| json!({
                        "id": c.id,
                        "type": "function",
                        "function": {"name": c.name, "arguments": c.args.to_string()},
                    })).collect::<Vec<_>>(),
                }),
                Role::Assistant => json!({"role": "assistant", "content": m.content}),
                Role::Tool => json!({
                    "role": "tool",
                    "tool_call_id": m.tool_call_id,
                    "content": m.content,
                }),
            });
        }
        api_messages
    }

    fn build_tools(tools: &[ToolSpec]) -> Vec<Value> {
        tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters,
                    }
                })
            })
            .collect()
    }
}

#[async_trait]
impl TextGenerator for OpenAiGenerator {
    async fn generate(
        &self,
        system_prompt: Option<&str>,
        messages: &[ChatMessage],
        tools: &[ToolSpec],
    ) -> MaestroResult<Generation> {
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let mut body = json!({
            "model": self.config.model_id,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
            "messages": self.build_messages(system_prompt, messages),
        });
        if !tools.is_empty() {
            body["tools"] = json!(Self::build_tools(tools));
        }

        debug!(model = %self.config.model_id, messages = messages.len(), "Calling model");
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| MaestroError::Http(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let error_body = resp
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(MaestroError::Model(format!("API error {status}: {error_body}")));
        }
        let resp_body: Value = resp
            .json()
            .await
            .map_err(|e| MaestroError::Model(format!("invalid response body: {e}")))?;

        parse_response(&resp_body)
    }
}

/// Convert a chat completions response body into a [`Generation`].
pub fn parse_response(body: &Value) -> MaestroResult<Generation> {
    let message = body
        .pointer("/choices/0/message")
        .ok_or_else(|| MaestroError::Model(format!("response has no choices: {body}")))?;
    let content = message
        .get("content")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let raw_calls = message
        .get("tool_calls")
        .and_then(Value::as_array)
        .filter(|calls| !calls.is_empty());
    let Some(raw_calls) = raw_calls else {
        return Ok(Generation::Text(content));
    };

    let tool_calls: Vec<ToolCall> = raw_calls
        .iter()
        .filter_map(|raw| match ToolCall::normalize(raw.clone()) {
            Ok(call) => Some(call),
            Err(e) => {
                warn!(error = %e, "Dropping malformed tool call");
                None
            }
        })
        .collect();

    Ok(Generation::ToolUse {
        content: (!content.is_empty()).then_some(content),
        tool_calls,
    })
}
