use crate::card::{AgentSummary, ExternalAgent};
use crate::client::HttpTimeouts;
use crate::config::{AgentEndpointConfig, RegistrySource};
use crate::discovery::discover_agent;
use crate::error::A2aError;
use futures_util::future::join_all;
use std::collections::HashMap;
use std::path::Path;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Process-wide cache of discovered external agents.
///
/// Shared by reference between runs. Lookups take the read lock; discovery
/// fetches cards without holding any lock and only takes the write lock to
/// insert the result, so a slow agent never blocks readers.
pub struct AgentRegistry {
    client: reqwest::Client,
    agents: RwLock<HashMap<String, ExternalAgent>>,
}

impl AgentRegistry {
    /// Create an empty registry whose discovery client uses `timeouts`.
    pub fn new(timeouts: HttpTimeouts) -> Result<Self, A2aError> {
        Ok(Self::with_client(timeouts.build_client()?))
    }

    /// Create an empty registry around an existing HTTP client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            agents: RwLock::new(HashMap::new()),
        }
    }

    /// Discover the agent at `base_url` and register it as `name`.
    ///
    /// Re-discovering an existing name overwrites the previous entry.
    pub async fn discover(
        &self,
        name: &str,
        base_url: &str,
        auth_token: Option<&str>,
    ) -> Result<ExternalAgent, A2aError> {
        let agent = discover_agent(&self.client, name, base_url, auth_token).await?;
        info!(
            agent = %name,
            base_url = %base_url,
            capabilities = agent.capabilities.len(),
            "Registered external agent"
        );
        self.agents
            .write()
            .await
            .insert(name.to_string(), agent.clone());
        Ok(agent)
    }

    /// Discover every configured agent concurrently.
    ///
    /// Failures are logged and skipped; the successfully discovered agents
    /// are returned in config order.
    pub async fn discover_many(&self, configs: &[AgentEndpointConfig]) -> Vec<ExternalAgent> {
        let results = join_all(configs.iter().map(|c| {
            self.discover(&c.name, &c.base_url, c.auth_token.as_deref())
        }))
        .await;

        results
            .into_iter()
            .zip(configs)
            .filter_map(|(result, config)| match result {
                Ok(agent) => Some(agent),
                Err(e) => {
                    warn!(
                        agent = %config.name,
                        base_url = %config.base_url,
                        error = %e,
                        "Failed to discover external agent"
                    );
                    None
                }
            })
            .collect()
    }

    /// Look up an agent by its registered name.
    pub async fn get(&self, name: &str) -> Option<ExternalAgent> {
        self.agents.read().await.get(name).cloned()
    }

    /// True when `name` is registered.
    pub async fn contains(&self, name: &str) -> bool {
        self.agents.read().await.contains_key(name)
    }

    /// All registered agents, sorted by name.
    pub async fn list(&self) -> Vec<ExternalAgent> {
        let mut agents: Vec<ExternalAgent> = self.agents.read().await.values().cloned().collect();
        agents.sort_by(|a, b| a.name.cmp(&b.name));
        agents
    }

    /// Token-free summaries of all agents, sorted by name.
    pub async fn summaries(&self) -> Vec<AgentSummary> {
        self.list().await.iter().map(ExternalAgent::summary).collect()
    }

    /// Drop every registered agent.
    pub async fn reset(&self) {
        self.agents.write().await.clear();
    }

    /// Populate from the first present bootstrap source.
    ///
    /// No source at all is not an error. Individual discovery failures are
    /// skipped; only an unreadable or malformed source is reported.
    pub async fn init_from_source(
        &self,
        source: Option<RegistrySource>,
    ) -> Result<Vec<ExternalAgent>, A2aError> {
        let Some(source) = source else {
            info!("No external agent configuration found");
            return Ok(Vec::new());
        };
        let configs = source.load().await?;
        // Inline sources may carry tokens, so only the origin is logged.
        let origin = match &source {
            RegistrySource::File(path) => path.display().to_string(),
            RegistrySource::Inline(_) => crate::config::INLINE_AGENTS_ENV.to_string(),
        };
        info!(count = configs.len(), source = %origin, "Discovering external agents");
        Ok(self.discover_many(&configs).await)
    }

    /// [`init_from_source`](Self::init_from_source) using the standard
    /// resolution order over `explicit` and the process environment.
    pub async fn init(&self, explicit: Option<&Path>) -> Result<Vec<ExternalAgent>, A2aError> {
        self.init_from_source(RegistrySource::resolve(explicit)).await
    }
}
