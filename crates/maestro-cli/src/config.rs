use maestro_a2a::{DispatchMode, HttpTimeouts};
use maestro_orchestrator::{EngineSettings, ModelConfig, RetryPolicy};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// Contents of `maestro.toml`. Every section is optional.
#[derive(Debug, Default, Deserialize)]
pub struct MaestroConfig {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub engine: EngineSettings,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub a2a: A2aSettings,
}

#[derive(Debug, Default, Deserialize)]
pub struct A2aSettings {
    /// Read dispatch replies as an SSE stream.
    #[serde(default)]
    pub streaming: bool,
    /// Registry bootstrap file; the environment is consulted when unset.
    #[serde(default)]
    pub config_path: Option<PathBuf>,
    #[serde(default)]
    pub timeouts: HttpTimeouts,
}

impl A2aSettings {
    pub fn dispatch_mode(&self) -> DispatchMode {
        if self.streaming {
            DispatchMode::Streaming
        } else {
            DispatchMode::Batch
        }
    }
}

impl MaestroConfig {
    /// Load `path`, falling back to defaults when the file does not exist,
    /// then fill model credentials from the environment.
    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config: MaestroConfig = match tokio::fs::read_to_string(path).await {
            Ok(raw) => toml::from_str(&raw)
                .map_err(|e| anyhow::anyhow!("Invalid config file '{}': {e}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "No config file, using defaults");
                MaestroConfig::default()
            }
            Err(e) => {
                return Err(anyhow::anyhow!(
                    "Failed to read config file '{}': {e}",
                    path.display()
                ))
            }
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// API key from `OPENROUTER_API_KEY` or `OPENAI_API_KEY` when the file
    /// has none; `OPENROUTER_ENDPOINT` overrides the base URL.
    pub fn apply_env<F>(&mut self, env: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.model.api_key.is_empty() {
            if let Some(key) = env("OPENROUTER_API_KEY").or_else(|| env("OPENAI_API_KEY")) {
                self.model.api_key = key;
            }
        }
        if let Some(endpoint) = env("OPENROUTER_ENDPOINT").filter(|e| !e.is_empty()) {
            self.model.base_url = endpoint;
        }
    }
}
