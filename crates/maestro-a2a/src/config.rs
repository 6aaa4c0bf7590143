use crate::error::A2aError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming a registry config file.
pub const CONFIG_PATH_ENV: &str = "A2A_CONFIG_PATH";
/// Environment variable holding an inline JSON agent list.
pub const INLINE_AGENTS_ENV: &str = "A2A_AGENTS";

/// One external agent to discover at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentEndpointConfig {
    /// Local alias the agent is registered under.
    pub name: String,
    /// Root URL of the agent.
    pub base_url: String,
    /// Optional bearer token.
    #[serde(default)]
    pub auth_token: Option<String>,
}

/// Shape of a registry config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistryFileConfig {
    /// Agents to discover.
    #[serde(default)]
    pub external_agents: Vec<AgentEndpointConfig>,
}

/// Where the bootstrap list comes from. Exactly one source is used.
#[derive(Debug, Clone, PartialEq)]
pub enum RegistrySource {
    /// A JSON file `{external_agents: [...]}`.
    File(PathBuf),
    /// A JSON array `[{name, base_url, auth_token?}]`.
    Inline(String),
}

impl RegistrySource {
    /// Pick the first present source: the explicit path, then the path in
    /// `A2A_CONFIG_PATH`, then the inline list in `A2A_AGENTS`.
    ///
    /// A path only counts as present when the file exists.
    pub fn resolve(explicit: Option<&Path>) -> Option<Self> {
        Self::resolve_with(explicit, |key| std::env::var(key).ok())
    }

    /// [`resolve`](Self::resolve) with an injectable environment lookup.
    pub fn resolve_with<F>(explicit: Option<&Path>, env: F) -> Option<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = explicit.filter(|p| p.is_file()) {
            return Some(Self::File(path.to_path_buf()));
        }
        if let Some(path) = env(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .filter(|p| p.is_file())
        {
            return Some(Self::File(path));
        }
        env(INLINE_AGENTS_ENV)
            .filter(|s| !s.trim().is_empty())
            .map(Self::Inline)
    }

    /// Read and parse the agent list.
    pub async fn load(&self) -> Result<Vec<AgentEndpointConfig>, A2aError> {
        match self {
            Self::File(path) => {
                let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
                    A2aError::Config(format!("cannot read {}: {e}", path.display()))
                })?;
                let file: RegistryFileConfig = serde_json::from_str(&raw).map_err(|e| {
                    A2aError::Config(format!("invalid registry file {}: {e}", path.display()))
                })?;
                Ok(file.external_agents)
            }
            Self::Inline(raw) => serde_json::from_str(raw)
                .map_err(|e| A2aError::Config(format!("invalid {INLINE_AGENTS_ENV}: {e}"))),
        }
    }
}
