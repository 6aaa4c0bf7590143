//! Command-line entry point for Maestro.

mod config;

use clap::{Parser, Subcommand};
use config::MaestroConfig;
use futures_util::StreamExt;
use maestro_a2a::AgentRegistry;
use maestro_core::{OverallStatus, RunState};
use maestro_orchestrator::{Maestro, OpenAiGenerator};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "maestro", about = "Maestro — multi-agent workflow runner")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "maestro.toml")]
    config: PathBuf,

    /// External agent list (JSON); overrides the config file and environment
    #[arg(long)]
    a2a_config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a request through the workflow
    Run {
        /// What to build
        request: String,
        /// Print each node's update as it happens
        #[arg(long)]
        stream: bool,
    },
    /// List discovered external agents
    Agents,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = MaestroConfig::load(&cli.config).await?;

    let registry = Arc::new(AgentRegistry::new(config.a2a.timeouts)?);
    let explicit = cli.a2a_config.or_else(|| config.a2a.config_path.clone());
    let agents = registry.init(explicit.as_deref()).await?;
    info!(count = agents.len(), "External agents ready");

    match cli.command {
        Commands::Agents => {
            if agents.is_empty() {
                println!("No external agents registered.");
                println!("Set A2A_CONFIG_PATH or A2A_AGENTS, or pass --a2a-config");
                return Ok(());
            }
            println!("External agents:");
            for agent in registry.list().await {
                println!("  {} — {} ({})", agent.name, agent.description, agent.base_url);
                for cap in &agent.capabilities {
                    println!("    - {cap}");
                }
            }
            println!("\nTotal: {} agent(s)", agents.len());
        }
        Commands::Run { request, stream } => {
            if config.model.api_key.is_empty() {
                anyhow::bail!(
                    "No API key: set [model].api_key, OPENROUTER_API_KEY or OPENAI_API_KEY"
                );
            }
            let mode = config.a2a.dispatch_mode();
            let generator = Arc::new(OpenAiGenerator::new(config.model)?);
            let maestro = Maestro::builder(generator, registry)
                .retry_policy(config.retry)
                .engine_settings(config.engine)
                .dispatch_timeouts(config.a2a.timeouts)
                .dispatch_mode(mode)
                .build()?;

            let state = if stream {
                let mut state = maestro.engine().initial_state(&request);
                let mut events = std::pin::pin!(maestro.stream(&request));
                while let Some(event) = events.next().await {
                    println!("{}", serde_json::to_string(&event)?);
                    state.merge(event.update);
                }
                state
            } else {
                maestro.run(&request).await
            };

            report(&state);
            if state.overall_status == OverallStatus::Failed {
                anyhow::bail!(
                    "Run failed: {}",
                    state.error.as_deref().unwrap_or("unknown error")
                );
            }
        }
    }

    Ok(())
}

fn report(state: &RunState) {
    println!("\nStatus: {}", state.overall_status);
    println!("Tasks:");
    for t in &state.tasks {
        println!("  [{}] {} — {} ({})", t.id, t.content, t.assigned_to, t.status);
        if let Some(err) = &t.last_error {
            println!("      error: {err}");
        }
    }
    if let Some(summary) = &state.summary {
        println!("\n{summary}");
    }
}
