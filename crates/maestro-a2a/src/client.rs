use crate::card::ExternalAgent;
use crate::error::A2aError;
use crate::extract::extract_text;
use futures_util::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::pin::Pin;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

/// Independent timeouts applied to every outbound call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpTimeouts {
    /// TCP/TLS connect timeout in seconds.
    pub connect_secs: u64,
    /// Maximum idle time between reads in seconds.
    pub read_secs: u64,
    /// Overall request deadline in seconds.
    pub request_secs: u64,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self {
            connect_secs: 10,
            read_secs: 60,
            request_secs: 300,
        }
    }
}

impl HttpTimeouts {
    /// Build a reqwest client carrying these timeouts.
    pub fn build_client(&self) -> Result<reqwest::Client, A2aError> {
        reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(self.connect_secs))
            .read_timeout(Duration::from_secs(self.read_secs))
            .timeout(Duration::from_secs(self.request_secs))
            .build()
            .map_err(|e| A2aError::Network(format!("Failed to create HTTP client: {e}")))
    }
}

/// Whether replies are read in one piece or as an SSE stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    /// Read the whole JSON reply.
    #[default]
    Batch,
    /// Read an SSE stream.
    Streaming,
}

/// Compose the text sent to an external agent.
///
/// Labeled paragraphs separated by a blank line; empty pieces are skipped.
pub fn build_message(user_request: &str, task_content: &str, plan: Option<&str>) -> String {
    let mut paragraphs = Vec::new();
    if !user_request.is_empty() {
        paragraphs.push(format!("Original request: {user_request}"));
    }
    if !task_content.is_empty() {
        paragraphs.push(format!("Specific task: {task_content}"));
    }
    if let Some(plan) = plan.filter(|p| !p.is_empty()) {
        paragraphs.push(format!("Overall plan: {plan}"));
    }
    paragraphs.join("\n\n")
}

/// The request body for a dispatch.
pub fn envelope(text: &str) -> Value {
    json!({
        "message": {
            "role": "user",
            "parts": [{"kind": "text", "text": text}],
            "messageId": Uuid::new_v4().simple().to_string(),
        }
    })
}

/// Sends task messages to external agents.
///
/// The client never retries on its own; wrap calls in a retry helper when
/// transient failures should be retried.
#[derive(Clone)]
pub struct A2aClient {
    client: reqwest::Client,
    mode: DispatchMode,
}

impl A2aClient {
    /// Build a client with independent timeouts.
    pub fn new(timeouts: HttpTimeouts, mode: DispatchMode) -> Result<Self, A2aError> {
        Ok(Self::with_client(timeouts.build_client()?, mode))
    }

    /// Wrap an existing reqwest client.
    pub fn with_client(client: reqwest::Client, mode: DispatchMode) -> Self {
        Self { client, mode }
    }

    /// Reply handling mode.
    pub fn mode(&self) -> DispatchMode {
        self.mode
    }

    /// Send `text` to `agent` and return the extracted reply text.
    pub async fn send(&self, agent: &ExternalAgent, text: &str) -> Result<String, A2aError> {
        let endpoint = agent.endpoint();
        info!(agent = %agent.name, endpoint = %endpoint, mode = ?self.mode, "Dispatching to external agent");

        let mut req = self.client.post(endpoint).json(&envelope(text));
        if let Some(token) = agent.auth_token.as_deref() {
            req = req.bearer_auth(token);
        }
        if self.mode == DispatchMode::Streaming {
            req = req.header("Accept", "text/event-stream");
        }

        let response = req.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(A2aError::HttpError {
                status: status.as_u16(),
                body,
            });
        }

        let reply = match self.mode {
            DispatchMode::Batch => {
                let value: Value = response.json().await.map_err(|e| {
                    A2aError::InvalidResponse(format!("reply is not JSON: {e}"))
                })?;
                extract_text(&value).ok_or_else(|| {
                    A2aError::InvalidResponse(format!("no text found in reply: {value}"))
                })?
            }
            DispatchMode::Streaming => collect_stream(parse_sse(response.bytes_stream())).await?,
        };
        debug!(agent = %agent.name, chars = reply.len(), "External agent replied");
        Ok(reply)
    }
}

/// Drain an SSE event stream, appending the text of every event in order.
///
/// Any error discards what was collected so far. A stream with no text at
/// all is an error.
pub async fn collect_stream<S>(mut events: S) -> Result<String, A2aError>
where
    S: Stream<Item = Result<Value, A2aError>> + Unpin,
{
    let mut buffer = String::new();
    let mut seen = 0usize;
    while let Some(event) = events.next().await {
        let event = event?;
        seen += 1;
        if let Some(text) = extract_text(&event) {
            buffer.push_str(&text);
        }
    }
    if buffer.is_empty() {
        return Err(A2aError::InvalidResponse(format!(
            "stream ended without text ({seen} events)"
        )));
    }
    Ok(buffer)
}

struct SseState<S> {
    inner: Pin<Box<S>>,
    buffer: Vec<u8>,
    pending: VecDeque<Result<Value, A2aError>>,
    done: bool,
}

/// Turn a byte stream into the JSON payloads of its SSE `data:` lines.
pub fn parse_sse<S, E>(bytes: S) -> Pin<Box<dyn Stream<Item = Result<Value, A2aError>> + Send>>
where
    S: Stream<Item = Result<bytes::Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let state = SseState {
        inner: Box::pin(bytes),
        buffer: Vec::new(),
        pending: VecDeque::new(),
        done: false,
    };

    Box::pin(futures_util::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(event) = state.pending.pop_front() {
                return Some((event, state));
            }
            if state.done {
                return None;
            }
            match state.inner.next().await {
                Some(Ok(chunk)) => {
                    state.buffer.extend_from_slice(&chunk);
                    while let Some(pos) = state.buffer.iter().position(|b| *b == b'\n') {
                        let line: Vec<u8> = state.buffer.drain(..=pos).collect();
                        if let Some(event) = decode_sse_line(&line) {
                            state.pending.push_back(event);
                        }
                    }
                }
                Some(Err(e)) => {
                    state.done = true;
                    state
                        .pending
                        .push_back(Err(A2aError::StreamError(format!("stream read error: {e}"))));
                }
                None => {
                    state.done = true;
                    let rest = std::mem::take(&mut state.buffer);
                    if let Some(event) = decode_sse_line(&rest) {
                        state.pending.push_back(event);
                    }
                }
            }
        }
    }))
}

/// Decode a complete line as UTF-8, then parse it. Multi-byte characters
/// may straddle chunks, so only whole lines are decoded.
fn decode_sse_line(line: &[u8]) -> Option<Result<Value, A2aError>> {
    match std::str::from_utf8(line) {
        Ok(text) => parse_sse_line(text),
        Err(e) => Some(Err(A2aError::StreamError(format!("invalid UTF-8 in event: {e}")))),
    }
}

/// Parse one SSE line. Blank lines, comments, `[DONE]` and non-data fields
/// yield nothing.
fn parse_sse_line(line: &str) -> Option<Result<Value, A2aError>> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with(':') {
        return None;
    }
    let data = trimmed.strip_prefix("data:")?.trim_start();
    if data.is_empty() || data == "[DONE]" {
        return None;
    }
    Some(serde_json::from_str(data).map_err(|e| {
        A2aError::StreamError(format!("undecodable event: {e} (data: {data})"))
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use futures_util::stream;

    fn chunks(parts: &[&'static str]) -> Vec<Result<Bytes, String>> {
        parts.iter().map(|p| Ok(Bytes::from_static(p.as_bytes()))).collect()
    }

    #[test]
    fn message_has_labeled_paragraphs() {
        let msg = build_message("Build a site", "Review CSS", Some("1. style 2. ship"));
        assert_eq!(
            msg,
            "Original request: Build a site\n\nSpecific task: Review CSS\n\nOverall plan: 1. style 2. ship"
        );
        assert_eq!(build_message("", "Only task", None), "Specific task: Only task");
    }

    #[test]
    fn envelope_shape() {
        let env = envelope("hi");
        assert_eq!(env["message"]["role"], "user");
        assert_eq!(env["message"]["parts"][0]["kind"], "text");
        assert_eq!(env["message"]["parts"][0]["text"], "hi");
        assert_eq!(env["message"]["messageId"].as_str().unwrap().len(), 32);
        assert_ne!(envelope("hi")["message"]["messageId"], env["message"]["messageId"]);
    }

    #[test]
    fn sse_line_parsing() {
        assert!(parse_sse_line("").is_none());
        assert!(parse_sse_line(": keep-alive").is_none());
        assert!(parse_sse_line("event: message").is_none());
        assert!(parse_sse_line("data: [DONE]").is_none());
        assert!(parse_sse_line("data: {\"content\":\"x\"}").unwrap().is_ok());
        assert!(parse_sse_line("data:{\"content\":\"x\"}").unwrap().is_ok());
        assert!(parse_sse_line("data: {broken").unwrap().is_err());
    }

    #[tokio::test]
    async fn sse_events_split_across_chunks() {
        let bytes = stream::iter(chunks(&[
            "data: {\"result\":{\"message\":{\"parts\":[{\"kind\":\"text\",\"text\":\"Hel\"}]}}}\n\nda",
            "ta: {\"result\":{\"message\":{\"parts\":[{\"kind\":\"text\",\"text\":\"lo\"}]}}}\n\n",
            "data: [DONE]\n",
        ]));
        let text = collect_stream(parse_sse(bytes)).await.unwrap();
        assert_eq!(text, "Hello");
    }

    #[tokio::test]
    async fn multibyte_text_split_across_chunks_survives() {
        let event = "data: {\"content\":\"café 東京\"}\n\n".as_bytes();
        let cut = event.iter().position(|b| *b == 0xC3).unwrap() + 1;
        let bytes = stream::iter(vec![
            Ok::<_, String>(Bytes::copy_from_slice(&event[..cut])),
            Ok(Bytes::copy_from_slice(&event[cut..])),
        ]);
        assert_eq!(collect_stream(parse_sse(bytes)).await.unwrap(), "café 東京");
    }

    #[tokio::test]
    async fn invalid_utf8_line_is_a_stream_error() {
        let bytes = stream::iter(vec![Ok::<_, String>(Bytes::from_static(
            b"data: {\"content\":\"\xff\"}\n",
        ))]);
        let err = collect_stream(parse_sse(bytes)).await.unwrap_err();
        assert!(matches!(err, A2aError::StreamError(_)));
    }

    #[tokio::test]
    async fn trailing_event_without_newline_is_kept() {
        let bytes = stream::iter(chunks(&["data: {\"content\":\"tail\"}"]));
        assert_eq!(collect_stream(parse_sse(bytes)).await.unwrap(), "tail");
    }

    #[tokio::test]
    async fn transport_error_discards_partial_buffer() {
        let mut items = chunks(&["data: {\"content\":\"partial\"}\n\n"]);
        items.push(Err("connection reset".to_string()));
        let err = collect_stream(parse_sse(stream::iter(items))).await.unwrap_err();
        assert!(matches!(err, A2aError::StreamError(_)));
    }

    #[tokio::test]
    async fn empty_stream_is_an_error() {
        let bytes = stream::iter(chunks(&[": ping\n\n", "data: [DONE]\n"]));
        let err = collect_stream(parse_sse(bytes)).await.unwrap_err();
        assert!(matches!(err, A2aError::InvalidResponse(_)));
    }
}
