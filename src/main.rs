// ABOUTME: Entry point for the dockyard CLI application.
// ABOUTME: Parses arguments, sets up logging, and dispatches to command handlers.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use commands::WorkerOptions;
use dockyard::config::{self, Config};
use dockyard::error::Result;
use dockyard::output::{Output, OutputMode};
use dockyard::types::{AppId, DeploymentId};
use std::env;
use std::path::Path;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let mode = OutputMode::from_flags(cli.quiet, cli.json);

    if let Err(e) = run(cli, mode).await {
        Output::new(mode).error(&e.to_string());
        std::process::exit(1);
    }
}

async fn run(cli: Cli, mode: OutputMode) -> Result<()> {
    let cwd = env::current_dir()?;
    let output = Output::new(mode);

    match cli.command {
        Commands::Init { base_domain, force } => {
            config::init_config(&cwd, base_domain.as_deref(), force)?;
            output.success(&format!("Wrote {}", config::CONFIG_FILENAME));
            Ok(())
        }
        Commands::Worker {
            init_schema,
            once,
            instance,
        } => {
            let config = load_config(cli.config.as_deref(), &cwd)?;
            let options = WorkerOptions {
                init_schema,
                once,
                instance,
            };
            commands::worker(config, options, output).await
        }
        Commands::Enqueue { app_id } => {
            let config = load_config(cli.config.as_deref(), &cwd)?;
            commands::enqueue(config, AppId::new(app_id), output).await
        }
        Commands::Status {
            deployment_id,
            build_log,
        } => {
            let config = load_config(cli.config.as_deref(), &cwd)?;
            commands::status(config, DeploymentId::new(deployment_id), build_log, output).await
        }
        Commands::Logs {
            deployment_id,
            tail,
        } => {
            let config = load_config(cli.config.as_deref(), &cwd)?;
            commands::logs(config, DeploymentId::new(deployment_id), tail, output).await
        }
        Commands::Teardown {
            deployment_id,
            timeout,
        } => {
            let config = load_config(cli.config.as_deref(), &cwd)?;
            commands::teardown(
                config,
                DeploymentId::new(deployment_id),
                Duration::from_secs(timeout),
                output,
            )
            .await
        }
    }
}

/// Load the file named by `--config`, or discover one in `cwd`.
fn load_config(path: Option<&Path>, cwd: &Path) -> Result<Config> {
    match path {
        Some(path) => Config::load(path),
        None => Config::discover(cwd),
    }
}
