//! Feedback service entry point
//!
//! Runs the HTTP API by default; `analyze-all` and `average-score` run the
//! same operations once against the configured store and exit.

mod cli;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{debug, Level};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "feedback-service")]
#[command(about = "Feedback management API with sentiment scoring", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Set log level
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Configuration file (TOML)
    #[arg(long, env = "FEEDBACK_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Listen address (overrides server.addr)
    #[arg(long, global = true)]
    addr: Option<String>,

    /// Store connection string (overrides store.url)
    #[arg(long, global = true)]
    database_url: Option<String>,

    /// Sentiment service base URL (overrides sentiment.base_url)
    #[arg(long, global = true)]
    sentiment_url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API (default)
    Serve,

    /// Score every feedback with an id and text, then exit
    AnalyzeAll,

    /// Print the average score over scored feedback, then exit
    AverageScore,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Our crates at the requested level, noisy dependencies at warn
    let level = level.as_str().to_lowercase();
    let filter = EnvFilter::new(format!(
        "feedback_core={level},feedback_service={level},tower_http={level},libsql=warn,hyper=warn",
        level = level
    ));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    debug!("Feedback service v{} starting...", env!("CARGO_PKG_VERSION"));

    let overrides = cli::helpers::Overrides {
        addr: cli.addr,
        database_url: cli.database_url,
        sentiment_url: cli.sentiment_url,
    };
    let config = cli::helpers::load_config(cli.config.as_deref(), overrides)?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => cli::serve::handle(config).await,
        Commands::AnalyzeAll => cli::batch::analyze_all(config).await,
        Commands::AverageScore => cli::batch::average_score(config).await,
    }
}
