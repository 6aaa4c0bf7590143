use crate::error::{MaestroError, MaestroResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A model-initiated tool invocation in canonical form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Identifier assigned by the model (or generated when it gave none).
    pub id: String,
    /// Name of the tool to invoke.
    pub name: String,
    /// JSON arguments to pass to the tool.
    pub args: Value,
}

/// Shapes a model may use for a tool call, before normalization.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawToolCall {
    /// `{id, type: "function", function: {name, arguments}}` where
    /// `arguments` is usually a JSON-encoded string.
    Function {
        #[serde(default)]
        id: Option<String>,
        function: RawFunction,
    },
    /// `{name, args | arguments, id?}`.
    Dict {
        name: String,
        #[serde(default, alias = "arguments")]
        args: Option<Value>,
        #[serde(default)]
        id: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
struct RawFunction {
    name: String,
    #[serde(default)]
    arguments: Option<Value>,
}

impl ToolCall {
    /// A call with an explicit id.
    pub fn new(id: impl Into<String>, name: impl Into<String>, args: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            args,
        }
    }

    /// Normalize any accepted tool-call shape into a [`ToolCall`].
    pub fn normalize(raw: Value) -> MaestroResult<Self> {
        let parsed: RawToolCall = serde_json::from_value(raw)
            .map_err(|e| MaestroError::Tool(format!("unrecognized tool call shape: {e}")))?;
        let (id, name, args) = match parsed {
            RawToolCall::Function { id, function } => (id, function.name, function.arguments),
            RawToolCall::Dict { name, args, id } => (id, name, args),
        };
        Ok(Self {
            id: id
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| format!("call_{}", crate::task::short_id())),
            name,
            args: decode_args(args)?,
        })
    }
}

/// Arguments may arrive as an object or as a string holding JSON.
fn decode_args(args: Option<Value>) -> MaestroResult<Value> {
    match args {
        None | Some(Value::Null) => Ok(Value::Object(Default::default())),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(Value::Object(Default::default())),
        Some(Value::String(s)) => serde_json::from_str(&s)
            .map_err(|e| MaestroError::Tool(format!("tool arguments are not valid JSON: {e}"))),
        Some(other) => Ok(other),
    }
}

/// The result returned after executing a [`ToolCall`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// The id of the call this result answers.
    pub call_id: String,
    /// Textual output of the tool.
    pub content: String,
    /// Whether the tool execution ended in an error.
    pub is_error: bool,
}

impl ToolResult {
    /// Creates a successful tool result.
    pub fn success(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            content: content.into(),
            is_error: false,
        }
    }

    /// Creates an error tool result.
    pub fn error(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            content: content.into(),
            is_error: true,
        }
    }
}
