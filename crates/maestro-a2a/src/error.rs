use maestro_core::MaestroError;
use thiserror::Error;

/// Errors that can occur while talking to external agents.
#[derive(Error, Debug)]
pub enum A2aError {
    /// Connection refused, DNS failure and similar transport problems.
    #[error("Network error: {0}")]
    Network(String),

    /// Connect, read or overall request timeout elapsed.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Non-success HTTP status.
    #[error("HTTP {status}: {body}")]
    HttpError {
        /// Status code.
        status: u16,
        /// Response body, possibly empty.
        body: String,
    },

    /// The agent card could not be parsed.
    #[error("Invalid agent card: {0}")]
    InvalidAgentCard(String),

    /// The reply matched none of the known shapes.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The SSE stream broke off or carried an undecodable event.
    #[error("Stream error: {0}")]
    StreamError(String),

    /// No agent registered under this name.
    #[error("External agent '{0}' is not registered")]
    UnknownAgent(String),

    /// Bootstrap configuration is unreadable or malformed.
    #[error("Registry config error: {0}")]
    Config(String),
}

impl A2aError {
    /// Whether another attempt may succeed.
    ///
    /// Transport failures, rate limiting and server errors are transient;
    /// protocol and configuration errors are not.
    pub fn is_transient(&self) -> bool {
        match self {
            A2aError::Network(_) | A2aError::Timeout(_) | A2aError::StreamError(_) => true,
            A2aError::HttpError { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for A2aError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            A2aError::Timeout(e.to_string())
        } else if e.is_decode() {
            A2aError::InvalidResponse(e.to_string())
        } else {
            A2aError::Network(e.to_string())
        }
    }
}

impl From<A2aError> for MaestroError {
    fn from(e: A2aError) -> Self {
        match e {
            A2aError::Network(_) | A2aError::Timeout(_) | A2aError::HttpError { .. } => {
                MaestroError::Http(e.to_string())
            }
            A2aError::InvalidAgentCard(_) | A2aError::UnknownAgent(_) => {
                MaestroError::Registry(e.to_string())
            }
            A2aError::Config(_) => MaestroError::Config(e.to_string()),
            A2aError::InvalidResponse(_) | A2aError::StreamError(_) => {
                MaestroError::Dispatch(e.to_string())
            }
        }
    }
}
