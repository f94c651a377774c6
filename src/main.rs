mod doctor;

use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use touchline_agent::{answer_question, Collaborators, QuestionWorkflow, WorkflowExecutor};
use touchline_core::config::AppConfig;
use touchline_core::event::EventBus;
use touchline_core::types::WorkflowEvent;
use touchline_llm::{LlmAnswerGenerator, LlmClassifier, LlmLookupPlanner};
use touchline_tools::{SportsDbClient, TavilySearch};

#[derive(Parser)]
#[command(name = "touchline", version, about = "Football question answering over a routed workflow")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "touchline.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway (default)
    Serve,
    /// Answer a single question and exit
    Ask {
        /// The question. Read from stdin when omitted.
        #[arg(trailing_var_arg = true)]
        question: Vec<String>,
        /// Print workflow events to stderr
        #[arg(long, short)]
        verbose: bool,
    },
    /// Show current configuration
    Config,
    /// Print the workflow graph as a Mermaid diagram
    Graph,
    /// Check configuration for common problems
    Doctor,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("touchline=info,warn")),
        )
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    // Handle completions before config loading
    if let Some(Commands::Completions { shell }) = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(*shell, &mut cmd, "touchline", &mut io::stdout());
        return Ok(());
    }

    let config = if cli.config.exists() {
        AppConfig::load(&cli.config)?
    } else {
        warn!(path = %cli.config.display(), "No config file found, reading settings from the environment");
        eprintln!("See touchline.toml.example for reference.");
        create_env_config()?
    };

    match cli.command {
        Some(Commands::Config) => {
            println!("{}", toml::to_string_pretty(&config)?);
        }
        Some(Commands::Doctor) => {
            println!("Touchline Doctor");
            println!("================");
            println!();
            let issues = doctor::run_doctor(&config);
            if issues > 0 {
                std::process::exit(1);
            }
        }
        Some(Commands::Graph) => {
            let executor = build_executor(&config)?;
            print!("{}", executor.graph().to_mermaid());
        }
        Some(Commands::Ask { question, verbose }) => {
            let question = if question.is_empty() {
                let mut buf = String::new();
                io::stdin().read_to_string(&mut buf)?;
                buf
            } else {
                question.join(" ")
            };
            let question = question.trim();
            if question.is_empty() {
                anyhow::bail!("question must not be empty");
            }

            let bus = Arc::new(EventBus::new(config.workflow.event_capacity));
            let executor = build_executor(&config)?.with_event_bus(bus.clone());
            if verbose {
                spawn_event_printer(&bus);
            }

            let cancel = CancellationToken::new();
            let cancel_clone = cancel.clone();
            tokio::spawn(async move {
                tokio::signal::ctrl_c().await.ok();
                cancel_clone.cancel();
            });

            let answer = answer_question(&executor, question, cancel).await?;
            println!("{answer}");
        }
        Some(Commands::Serve) | None => {
            let bus = Arc::new(EventBus::new(config.workflow.event_capacity));
            let executor = build_executor(&config)?.with_event_bus(bus);

            info!(bind = %config.gateway.bind, "Starting HTTP gateway");
            let server =
                touchline_gateway::GatewayServer::new(config.gateway.clone(), Arc::new(executor));
            let cancel = CancellationToken::new();
            let cancel_clone = cancel.clone();

            // Graceful shutdown on Ctrl-C
            tokio::spawn(async move {
                tokio::signal::ctrl_c().await.ok();
                info!("Shutting down gateway...");
                cancel_clone.cancel();
            });

            server.run(cancel).await?;
        }
        Some(Commands::Completions { .. }) => unreachable!("handled before config load"),
    }

    Ok(())
}

/// Wire the LLM client, providers and steps described by `config`.
fn build_executor(config: &AppConfig) -> anyhow::Result<WorkflowExecutor> {
    let llm = touchline_llm::build_client(config);

    let collaborators = Collaborators {
        classifier: Arc::new(LlmClassifier::new(llm.clone(), config.model.clone())),
        web_search: Arc::new(TavilySearch::new(&config.web_search)?),
        domain_data: Arc::new(SportsDbClient::new(&config.sports_data)?),
        planner: Arc::new(LlmLookupPlanner::new(llm.clone(), config.model.clone())),
        generator: Arc::new(LlmAnswerGenerator::new(llm, config.model.clone())),
    };

    let executor =
        QuestionWorkflow::configured(collaborators, &config.web_search, &config.workflow)
            .executor()?;
    Ok(executor)
}

fn spawn_event_printer(bus: &EventBus) {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = rx.recv().await {
            match event {
                WorkflowEvent::RunStarted { run_id } => eprintln!("[run {run_id}]"),
                WorkflowEvent::RouteDecided { decision, .. } => eprintln!("[route: {decision}]"),
                WorkflowEvent::StepStarted { step, .. } => eprintln!("[{step}: started]"),
                WorkflowEvent::StepCompleted {
                    step, elapsed_ms, ..
                } => eprintln!("[{step}: done in {elapsed_ms}ms]"),
                WorkflowEvent::FanOutStarted {
                    branches, barrier, ..
                } => eprintln!("[fan-out: {} -> {barrier}]", branches.join(", ")),
                WorkflowEvent::BarrierReached { barrier, .. } => {
                    eprintln!("[barrier: {barrier}]")
                }
                WorkflowEvent::RunCompleted { elapsed_ms, .. } => {
                    eprintln!("[completed in {elapsed_ms}ms]")
                }
                WorkflowEvent::RunFailed { error, .. } => eprintln!("[error: {error}]"),
                WorkflowEvent::RunCancelled { .. } => eprintln!("[cancelled]"),
            }
        }
    });
}

/// Build a config from the Azure OpenAI and Tavily environment variables.
fn create_env_config() -> anyhow::Result<AppConfig> {
    let env = |name: &str| {
        std::env::var(name).with_context(|| format!("no config file and {name} is not set"))
    };

    let mut model = serde_json::json!({
        "provider": "azure",
        "model_id": std::env::var("AZURE_OPENAI_LLM_DEPLOYMENT")
            .unwrap_or_else(|_| "gpt-35-turbo".to_string()),
        "api_key": env("AZURE_OPENAI_KEY")?,
        "base_url": env("AZURE_OPENAI_ENDPOINT")?,
    });
    if let Ok(version) = std::env::var("AZURE_OPENAI_API_VERSION") {
        model["azure_api_version"] = serde_json::Value::String(version);
    }

    let config = serde_json::json!({
        "model": model,
        "web_search": { "api_key": env("TAVILY_API_KEY")? },
    });
    Ok(serde_json::from_value(config)?)
}
