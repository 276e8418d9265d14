//! handsfree CLI - diagnostics front-end for the directive pipeline
//!
//! `parse` shows what the parser recognizes in a raw string, `probe` runs
//! the full parser -> gate -> normalizer -> dispatcher pipeline without any
//! model calls, and `turn` drives a complete agent turn against a configured
//! OpenAI-compatible provider.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use console::style;
use serde::Deserialize;

use handsfree_core::agent::{DirectiveParser, NominalSupervisor, TurnOrchestrator};
use handsfree_core::config::{default_capabilities, ConfigDocument, StaticConfigStore};
use handsfree_core::executor::{ActionExecutor, DryRunExecutor, HttpBridgeExecutor};
use handsfree_core::llm::{ChatMessage, ChatProvider, OpenAiCompatibleClient, ProviderConfig, ProviderError};

#[derive(Parser)]
#[command(name = "handsfree", version, about = "Assistant directive pipeline diagnostics")]
struct Cli {
    /// Path to a YAML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the directive recognized in a raw string, if any
    Parse {
        /// Raw assistant text to inspect
        raw: String,
    },
    /// Run parser, gate, normalizer and dispatcher on a raw string
    Probe {
        /// Raw assistant text to execute
        raw: String,
        /// Send actions to the device bridge instead of the dry-run echo
        #[arg(long)]
        bridge: bool,
    },
    /// Run one full agent turn against the configured provider
    Turn {
        /// User prompt
        prompt: String,
        /// Send actions to the device bridge instead of the dry-run echo
        #[arg(long)]
        bridge: bool,
    },
}

/// CLI configuration: the core document plus provider/bridge settings that
/// only the front-end needs.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct CliConfig {
    #[serde(flatten)]
    document: ConfigDocument,
    provider: Option<ProviderConfig>,
    bridge_endpoint: Option<String>,
}

fn load_config(path: Option<&PathBuf>) -> Result<CliConfig> {
    let Some(path) = path else {
        // No file: seed the default capability set so probes have something
        // to gate against.
        let mut config = CliConfig::default();
        config.document.tools = default_capabilities();
        return Ok(config);
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    serde_yml::from_str(&raw).with_context(|| format!("malformed config {}", path.display()))
}

/// Provider stub for probe runs, which never reach the model.
struct OfflineProvider;

#[async_trait]
impl ChatProvider for OfflineProvider {
    async fn complete(&self, _messages: &[ChatMessage]) -> Result<String, ProviderError> {
        Err(ProviderError::Transport("no provider configured".into()))
    }
}

fn build_executor(config: &CliConfig, bridge: bool) -> Result<Arc<dyn ActionExecutor>> {
    if bridge {
        let endpoint = config
            .bridge_endpoint
            .as_deref()
            .context("--bridge requires bridge_endpoint in the config file")?;
        Ok(Arc::new(HttpBridgeExecutor::new(endpoint)?))
    } else {
        Ok(Arc::new(DryRunExecutor))
    }
}

fn print_result(result: &handsfree_core::AgentTurnResult) {
    println!("{}", result.assistant_text);
    for event in &result.tool_events {
        let status = format!("{:?}", event.status).to_lowercase();
        eprintln!(
            "{} {} [{}] {}",
            style("tool:").dim(),
            style(&event.tool).cyan(),
            status,
            event.detail
        );
        if let Some(output) = &event.output {
            eprintln!("{} {}", style("output:").dim(), output);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Command::Parse { raw } => {
            match DirectiveParser::new().parse(&raw) {
                Some(directive) => println!("{}", serde_json::to_string_pretty(&directive)?),
                None => println!("no directive recognized"),
            }
        }
        Command::Probe { raw, bridge } => {
            let executor = build_executor(&config, bridge)?;
            let store = Arc::new(StaticConfigStore::new(config.document.clone()));
            let orchestrator = TurnOrchestrator::new(
                Arc::new(OfflineProvider),
                executor,
                store,
                Arc::new(NominalSupervisor),
            );
            let result = orchestrator.run_tool_probe(&raw).await;
            print_result(&result);
        }
        Command::Turn { prompt, bridge } => {
            let Some(provider_config) = config.provider.clone() else {
                bail!("turn requires a provider section in the config file");
            };
            let provider = OpenAiCompatibleClient::new(provider_config)
                .context("failed to build provider client")?;
            let executor = build_executor(&config, bridge)?;
            let store = Arc::new(StaticConfigStore::new(config.document.clone()));
            let orchestrator = TurnOrchestrator::new(
                Arc::new(provider),
                executor,
                store,
                Arc::new(NominalSupervisor),
            );
            let result = orchestrator.run_agent_turn(&prompt).await;
            print_result(&result);
        }
    }

    Ok(())
}
