//! Askgate daemon - question-answering gateway for LLM backends

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use askgate::backend::{ChatBackend, RemoteBackend};
use askgate::config::Config;
use askgate::error::Result;
use askgate::judge::ModelJudge;
use askgate::metrics::LogMetrics;
use askgate::pipeline::AnswerPipeline;
use askgate::server::GatewayServer;
use askgate::streaming::StreamingSession;

/// Askgate - a question-answering gateway with relevance-gated retries
#[derive(Parser)]
#[command(name = "askgate")]
#[command(about = "A question-answering gateway that gates LLM answers behind a relevance judge")]
#[command(version)]
pub struct Cli {
    /// Path to config file
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the gateway server (default command)
    #[command(name = "serve")]
    Serve,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    init_logging();

    let cli = Cli::parse();

    match cli.command {
        None | Some(Command::Serve) => serve(cli.config).await,
    }
}

fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,askgate=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn load_config(config_path: Option<PathBuf>) -> Result<Config> {
    if let Some(path) = config_path {
        tracing::info!("Loading config from: {}", path.display());
        return read_config(&path);
    }

    let default_paths = [
        dirs::home_dir().map(|h| h.join(".askgate").join("config.toml")),
        dirs::config_dir().map(|c| c.join("askgate").join("config.toml")),
        Some(PathBuf::from("config.toml")),
    ];

    for path in default_paths.iter().flatten() {
        if path.exists() {
            tracing::info!("Loading config from: {}", path.display());
            return read_config(path);
        }
    }

    tracing::info!("No config file found, using defaults");
    Ok(Config::default())
}

fn read_config(path: &PathBuf) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        askgate::AskgateError::Config(format!(
            "Failed to read config file {}: {}",
            path.display(),
            e
        ))
    })?;
    toml::from_str(&content)
        .map_err(|e| askgate::AskgateError::Config(format!("Failed to parse config: {e}")))
}

async fn serve(config_path: Option<PathBuf>) -> Result<()> {
    tracing::info!("Starting askgate daemon");

    let config = load_config(config_path)?;
    tracing::debug!("Config loaded: {:?}", config);

    config.backend.validate()?;

    let backend: Arc<dyn ChatBackend> = Arc::new(RemoteBackend::new(&config.backend)?);

    let judge = Arc::new(ModelJudge::new(
        Arc::clone(&backend),
        config.prompts.clone(),
    ));

    let pipeline = Arc::new(AnswerPipeline::new(
        Arc::clone(&backend),
        judge,
        Arc::new(LogMetrics),
        config.prompts.clone(),
    ));

    let streaming = Arc::new(StreamingSession::new(backend, config.prompts.clone()));

    let server = GatewayServer::new(config.server.clone(), pipeline, streaming);
    server.serve().await?;

    tracing::info!("Askgate daemon stopped");
    Ok(())
}
