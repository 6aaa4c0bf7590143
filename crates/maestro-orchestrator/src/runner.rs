use crate::llm::{ChatMessage, Generation, TextGenerator};
use crate::tools::ToolRegistry;
use maestro_core::{MaestroError, MaestroResult};
use tracing::{debug, info};

/// Default turn budget for one worker execution.
pub const DEFAULT_MAX_TURNS: u32 = 15;

/// The tool loop: prompt, model, tool calls, backfill, repeat.
pub struct ToolLoop<'a> {
    generator: &'a dyn TextGenerator,
    tools: &'a ToolRegistry,
    max_turns: u32,
}

impl<'a> ToolLoop<'a> {
    /// A loop over `tools` capped at `max_turns`.
    pub fn new(generator: &'a dyn TextGenerator, tools: &'a ToolRegistry, max_turns: u32) -> Self {
        Self {
            generator,
            tools,
            max_turns,
        }
    }

    /// Run until the model answers with plain text. Returns that text.
    pub async fn run(&self, worker: &str, system_prompt: &str, prompt: String) -> MaestroResult<String> {
        let specs = self.tools.specs();
        let mut messages = vec![ChatMessage::user(prompt)];

        for turn in 0..self.max_turns {
            debug!(worker = %worker, turn, "Tool loop turn");
            match self
                .generator
                .generate(Some(system_prompt), &messages, &specs)
                .await?
            {
                Generation::Text(text) => {
                    info!(worker = %worker, turns = turn + 1, "Tool loop completed");
                    return Ok(text);
                }
                Generation::ToolUse {
                    content,
                    tool_calls,
                } => {
                    if tool_calls.is_empty() {
                        return Ok(content.unwrap_or_default());
                    }
                    messages.push(ChatMessage::assistant(
                        content.unwrap_or_default(),
                        tool_calls.clone(),
                    ));
                    for call in &tool_calls {
                        info!(worker = %worker, tool = %call.name, call_id = %call.id, "Executing tool call");
                        let result = self.tools.execute(call).await;
                        messages.push(ChatMessage::tool(result.call_id, result.content));
                    }
                }
            }
        }

        Err(MaestroError::Worker(format!(
            "{worker} did not finish within {} turns",
            self.max_turns
        )))
    }
}
