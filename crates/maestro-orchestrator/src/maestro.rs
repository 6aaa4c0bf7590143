use crate::engine::{EngineSettings, NodeEvent, WorkflowEngine};
use crate::llm::{RetryingGenerator, TextGenerator};
use crate::nodes::{
    NodeContext, PipelineWorker, PlannerNode, RecoveryNode, RemoteDispatchNode, SummaryNode,
};
use crate::retry::{RetryManager, RetryPolicy};
use crate::routing::{AgentRole, RoutingPolicy};
use crate::runner::DEFAULT_MAX_TURNS;
use crate::tools::{Tool, ToolRegistry};
use futures_util::Stream;
use maestro_a2a::{A2aClient, AgentRegistry, DispatchMode, HttpTimeouts};
use maestro_core::{MaestroResult, RunState};
use std::sync::Arc;

/// The standard multi-agent workflow, ready to run requests.
///
/// Holds the engine and the shared external agent registry. Each call to
/// [`Maestro::run`] or [`Maestro::stream`] owns its own state.
pub struct Maestro {
    engine: Arc<WorkflowEngine>,
    registry: Arc<AgentRegistry>,
}

impl Maestro {
    /// Start building the standard workflow.
    pub fn builder(generator: Arc<dyn TextGenerator>, registry: Arc<AgentRegistry>) -> MaestroBuilder {
        MaestroBuilder {
            generator,
            registry,
            retry: RetryPolicy::default(),
            settings: EngineSettings::default(),
            timeouts: HttpTimeouts::default(),
            dispatch_mode: DispatchMode::default(),
            client: None,
            tools: ToolRegistry::new(),
            max_turns: DEFAULT_MAX_TURNS,
        }
    }

    /// Run `request` to completion and return the final state.
    pub async fn run(&self, request: &str) -> RunState {
        self.engine.run(request).await
    }

    /// Run `request`, yielding one event per node execution.
    pub fn stream(&self, request: &str) -> impl Stream<Item = NodeEvent> + Send + 'static {
        self.engine.stream(request)
    }

    /// External agents.
    pub fn registry(&self) -> &Arc<AgentRegistry> {
        &self.registry
    }

    /// Underlying engine.
    pub fn engine(&self) -> &Arc<WorkflowEngine> {
        &self.engine
    }
}

/// Configures a [`Maestro`].
pub struct MaestroBuilder {
    generator: Arc<dyn TextGenerator>,
    registry: Arc<AgentRegistry>,
    retry: RetryPolicy,
    settings: EngineSettings,
    timeouts: HttpTimeouts,
    dispatch_mode: DispatchMode,
    client: Option<A2aClient>,
    tools: ToolRegistry,
    max_turns: u32,
}

impl MaestroBuilder {
    /// Backoff for model calls and remote dispatch.
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    /// Override the loop ceilings.
    pub fn engine_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Timeouts for external dispatch.
    pub fn dispatch_timeouts(mut self, timeouts: HttpTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Batch or streaming replies.
    pub fn dispatch_mode(mut self, mode: DispatchMode) -> Self {
        self.dispatch_mode = mode;
        self
    }

    /// Use a prebuilt dispatch client; overrides timeouts and mode.
    pub fn a2a_client(mut self, client: A2aClient) -> Self {
        self.client = Some(client);
        self
    }

    /// Offer an extra tool to the pipeline workers.
    pub fn tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.register(tool);
        self
    }

    /// Model turns per worker execution.
    pub fn max_turns(mut self, turns: u32) -> Self {
        self.max_turns = turns;
        self
    }

    /// Wire the nodes.
    pub fn build(self) -> MaestroResult<Maestro> {
        let client = match self.client {
            Some(client) => client,
            None => A2aClient::new(self.timeouts, self.dispatch_mode)?,
        };
        let policy = RoutingPolicy::default();
        let ctx = Arc::new(NodeContext {
            generator: Arc::new(RetryingGenerator::new(self.generator, self.retry.clone())),
            policy: policy.clone(),
            tools: self.tools,
            max_turns: self.max_turns,
        });

        let engine = WorkflowEngine::builder(AgentRole::Planner.as_str())
            .node(Arc::new(PlannerNode::new(ctx.clone(), self.registry.clone())?))
            .node(Arc::new(PipelineWorker::architect(ctx.clone())))
            .node(Arc::new(PipelineWorker::coder(ctx.clone())))
            .node(Arc::new(PipelineWorker::tester(ctx.clone())))
            .node(Arc::new(RecoveryNode::new(ctx.clone())))
            .node(Arc::new(SummaryNode::new(ctx)))
            .node(Arc::new(RemoteDispatchNode::new(
                policy,
                self.registry.clone(),
                client,
                RetryManager::new(self.retry),
            )))
            .recovery(AgentRole::ErrorRecovery.as_str())
            .settings(self.settings)
            .build()?;

        Ok(Maestro {
            engine: Arc::new(engine),
            registry: self.registry,
        })
    }
}
