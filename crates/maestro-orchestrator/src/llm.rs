use crate::retry::{is_retryable, RetryManager, RetryPolicy};
use async_trait::async_trait;
use maestro_core::{MaestroResult, ToolCall};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Message role in a model conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// User turn.
    User,
    /// Model turn.
    Assistant,
    /// Tool result.
    Tool,
}

/// A single conversation message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Author.
    pub role: Role,
    /// Text.
    pub content: String,
    /// Calls requested by an assistant message.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// The call a tool message answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    /// A user turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    /// A model turn, possibly requesting tools.
    pub fn assistant(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_calls,
            tool_call_id: None,
        }
    }

    /// The result of tool call `call_id`.
    pub fn tool(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: Some(call_id.into()),
        }
    }
}

/// A tool as advertised to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Name the model calls.
    pub name: String,
    /// What the tool does.
    pub description: String,
    /// JSON schema of the arguments object.
    pub parameters: serde_json::Value,
}

/// What the model produced for one turn.
#[derive(Debug, Clone, PartialEq)]
pub enum Generation {
    /// Plain text; the turn is final.
    Text(String),
    /// The model asks for tools to be run.
    ToolUse {
        /// Text sent alongside the calls.
        content: Option<String>,
        /// Calls to run.
        tool_calls: Vec<ToolCall>,
    },
}

/// Boundary to the language model.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// One model turn over `messages`, offering `tools`.
    async fn generate(
        &self,
        system_prompt: Option<&str>,
        messages: &[ChatMessage],
        tools: &[ToolSpec],
    ) -> MaestroResult<Generation>;
}

/// Retries transient model errors with exponential backoff.
pub struct RetryingGenerator {
    inner: Arc<dyn TextGenerator>,
    retry: RetryManager,
}

impl RetryingGenerator {
    /// Wrap `inner` with `policy`.
    pub fn new(inner: Arc<dyn TextGenerator>, policy: RetryPolicy) -> Self {
        Self {
            inner,
            retry: RetryManager::new(policy),
        }
    }
}

#[async_trait]
impl TextGenerator for RetryingGenerator {
    async fn generate(
        &self,
        system_prompt: Option<&str>,
        messages: &[ChatMessage],
        tools: &[ToolSpec],
    ) -> MaestroResult<Generation> {
        self.retry
            .retry_with_backoff_if(
                || self.inner.generate(system_prompt, messages, tools),
                is_retryable,
                |_| {},
            )
            .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use maestro_core::MaestroError;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Flaky {
        calls: AtomicU32,
        fail_first: u32,
        error: &'static str,
    }

    #[async_trait]
    impl TextGenerator for Flaky {
        async fn generate(
            &self,
            _system_prompt: Option<&str>,
            _messages: &[ChatMessage],
            _tools: &[ToolSpec],
        ) -> MaestroResult<Generation> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first {
                Err(MaestroError::Model(self.error.into()))
            } else {
                Ok(Generation::Text("fine".into()))
            }
        }
    }

    fn fast() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            base_delay_ms: 1,
            max_delay_ms: 2,
            exponential_base: 2.0,
            jitter: false,
        }
    }

    #[tokio::test]
    async fn retries_rate_limits() {
        let flaky = Arc::new(Flaky {
            calls: AtomicU32::new(0),
            fail_first: 2,
            error: "429 rate limit",
        });
        let generator = RetryingGenerator::new(flaky.clone(), fast());
        let out = generator.generate(None, &[ChatMessage::user("hi")], &[]).await.unwrap();
        assert_eq!(out, Generation::Text("fine".into()));
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn does_not_retry_bad_requests() {
        let flaky = Arc::new(Flaky {
            calls: AtomicU32::new(0),
            fail_first: 5,
            error: "400 invalid model",
        });
        let generator = RetryingGenerator::new(flaky.clone(), fast());
        assert!(generator.generate(None, &[], &[]).await.is_err());
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 1);
    }
}
