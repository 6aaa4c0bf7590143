//! Reply text extraction.
//!
//! Remote agents answer in a handful of shapes. Each strategy is a pure
//! function that either finds text or gives up; [`extract_text`] tries them
//! in order and stops at the first hit.

use serde_json::Value;

/// A single extraction strategy.
pub type Strategy = fn(&Value) -> Option<String>;

/// Strategies in the order they are tried.
pub const STRATEGIES: &[(&str, Strategy)] = &[
    ("result.message.parts", from_result_message),
    ("message.parts", from_message),
    ("content", from_content),
    ("recursive", search_text),
];

/// Run every strategy in turn and return the first text found.
pub fn extract_text(reply: &Value) -> Option<String> {
    STRATEGIES.iter().find_map(|(_, strategy)| strategy(reply))
}

/// Concatenate the `text` of every part whose `kind` is `"text"`.
fn text_parts(message: &Value) -> Option<String> {
    let parts = message.get("parts")?.as_array()?;
    let texts: Vec<&str> = parts
        .iter()
        .filter(|p| p.get("kind").and_then(Value::as_str) == Some("text"))
        .filter_map(|p| p.get("text").and_then(Value::as_str))
        .collect();
    (!texts.is_empty()).then(|| texts.concat())
}

/// `{result: {message: {parts: [...]}}}`
pub fn from_result_message(reply: &Value) -> Option<String> {
    text_parts(reply.get("result")?.get("message")?)
}

/// `{message: {parts: [...]}}`
pub fn from_message(reply: &Value) -> Option<String> {
    text_parts(reply.get("message")?)
}

/// `{content: "..."}`
pub fn from_content(reply: &Value) -> Option<String> {
    reply.get("content")?.as_str().map(str::to_string)
}

const TEXT_KEYS: [&str; 3] = ["text", "content", "message"];

/// Depth-first search for the first string stored under `text`, `content`
/// or `message`.
pub fn search_text(reply: &Value) -> Option<String> {
    match reply {
        Value::Object(map) => {
            for (key, value) in map {
                if let Value::String(s) = value {
                    if TEXT_KEYS.contains(&key.as_str()) {
                        return Some(s.clone());
                    }
                }
            }
            map.values().find_map(search_text)
        }
        Value::Array(items) => items.iter().find_map(search_text),
        _ => None,
    }
}
