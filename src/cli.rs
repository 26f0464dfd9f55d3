// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "dockyard")]
#[command(about = "Build Git repositories into routed containers")]
#[command(version)]
pub struct Cli {
    /// Path to the configuration file (default: discover dockyard.yml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print results and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Print JSON lines instead of text
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a starter dockyard.yml in the current directory
    Init {
        /// Domain deployments are served under
        #[arg(long)]
        base_domain: Option<String>,

        /// Overwrite an existing configuration file
        #[arg(short, long)]
        force: bool,
    },

    /// Process queued deployments until interrupted
    Worker {
        /// Create the database tables if they are missing
        #[arg(long)]
        init_schema: bool,

        /// Process at most one deployment and exit
        #[arg(long)]
        once: bool,

        /// Extra label appended to this worker's identity in logs
        #[arg(long)]
        instance: Option<String>,
    },

    /// Queue a new deployment for an app
    Enqueue {
        /// App to deploy
        app_id: i64,
    },

    /// Show a deployment's status
    Status {
        deployment_id: i64,

        /// Include the stored build log
        #[arg(long)]
        build_log: bool,
    },

    /// Print the logs of a deployment's container
    Logs {
        deployment_id: i64,

        /// Number of lines from the end of the logs
        #[arg(short = 'n', long)]
        tail: Option<u64>,
    },

    /// Stop and remove a deployment's container
    Teardown {
        deployment_id: i64,

        /// Seconds to wait for the container to stop before killing it
        #[arg(long, default_value_t = 10)]
        timeout: u64,
    },
}
