//! CropChain worker binary.
//!
//! ```text
//! cropchain-worker [run]     listen for submissions until stopped
//! cropchain-worker probe     report which configured node would be used
//! ```
//!
//! Configuration comes from the environment, optionally from a `.env` file
//! (see `cropchain_worker::config` for the variables).

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cropchain_worker::{
    init_tracing, parse_component_level, probe_endpoints, LogConfig, Worker, WorkerConfig,
};

#[derive(Parser)]
#[command(
    name = "cropchain-worker",
    about = "Analyses submitted crop images and records verdicts on-chain",
    version
)]
struct Cli {
    /// Env file to load before reading configuration
    #[arg(long, global = true, default_value = ".env")]
    env_file: PathBuf,

    /// Default log level (RUST_LOG overrides)
    #[arg(long, global = true, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Per-component level, e.g. `--log-component cropchain-rpc-ws=debug` (repeatable)
    #[arg(long = "log-component", global = true, value_name = "COMPONENT=LEVEL", value_parser = parse_component_level)]
    log_components: Vec<(String, String)>,

    /// Emit JSON structured logs
    #[arg(long, global = true, env = "LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Subscribe to ImageSubmitted events and process them (default)
    Run,
    /// Probe the configured nodes and print the one that would be used
    Probe,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // a missing env file is fine; the environment may already be set
    if let Err(e) = dotenvy::from_path(&cli.env_file) {
        if !e.not_found() {
            return Err(e).with_context(|| format!("reading {}", cli.env_file.display()));
        }
    }

    init_tracing(&LogConfig {
        level: cli.log_level.clone(),
        components: cli.log_components.iter().cloned().collect(),
        json: cli.log_json,
    })
    .context("installing tracing subscriber")?;

    let config = WorkerConfig::from_env().context("loading configuration")?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(&config).await,
        Commands::Probe => probe(&config).await,
    }
}

async fn run(config: &WorkerConfig) -> Result<()> {
    let worker = Worker::new(config).context("building worker")?;
    tracing::info!(contract = %config.contract_address, "starting blockchain event listener");

    tokio::select! {
        result = worker.run() => {
            let err = match result {
                Ok(never) => match never {},
                Err(e) => e,
            };
            tracing::error!(error = %err, "worker stopped");
            Err(err.into())
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("waiting for Ctrl-C")?;
            tracing::info!("stopped by user");
            Ok(())
        }
    }
}

async fn probe(config: &WorkerConfig) -> Result<()> {
    let endpoint = probe_endpoints(config).await?;
    println!("{}  {}  ({})", endpoint.name, endpoint.url, endpoint.transport);
    Ok(())
}
