// ABOUTME: Worker command: runs the deployment engine against PostgreSQL and the local runtime.
// ABOUTME: Stops cleanly on Ctrl-C or SIGTERM after the deployment in flight finishes.

use super::connection::{connect_runtime, connect_store};
use dockyard::config::Config;
use dockyard::engine::{Engine, Outcome, ProcessReport, WorkerIdentity};
use dockyard::error::Result;
use dockyard::fetch::GitFetcher;
use dockyard::output::Output;
use tokio::sync::watch;
use tracing::{info, warn};

/// Flags accepted by `dockyard worker`.
#[derive(Debug, Default)]
pub struct WorkerOptions {
    pub init_schema: bool,
    pub once: bool,
    pub instance: Option<String>,
}

pub async fn worker(config: Config, options: WorkerOptions, mut output: Output) -> Result<()> {
    output.start_timer();

    let store = connect_store(&config, &output).await?;
    if options.init_schema {
        output.progress("  → Ensuring database schema...");
        store.ensure_schema().await?;
    }

    let runtime = connect_runtime(&config, &output).await?;
    let fetcher = GitFetcher::new(config.work_dir());

    let mut identity = WorkerIdentity::current();
    if let Some(instance) = options.instance {
        identity = identity.with_instance(instance);
    }

    let engine = Engine::new(store, runtime, fetcher, config.engine_config()).with_identity(identity);

    if options.once {
        let report = engine.process_next().await?;
        print_report(&report, &output);
        return Ok(());
    }

    output.progress(&format!("Worker {} waiting for deployments", engine.identity()));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("shutdown requested, finishing current deployment");
        let _ = shutdown_tx.send(true);
    });

    engine.run(shutdown_rx).await;

    output.success("Worker stopped");
    Ok(())
}

fn print_report(report: &ProcessReport, output: &Output) {
    for warning in &report.warnings {
        output.warning(&warning.message);
    }

    match &report.outcome {
        Outcome::LockBusy => output.success("Another worker holds the build lock"),
        Outcome::Idle => output.success("No pending deployments"),
        Outcome::Running { deployment_id, url } => {
            output.success(&format!("Deployment {} running at {}", deployment_id, url))
        }
        Outcome::Failed {
            deployment_id,
            stage,
            message,
        } => output.error(&format!(
            "Deployment {} failed during {}: {}",
            deployment_id, stage, message
        )),
        Outcome::Aborted {
            deployment_id,
            message,
        }
        | Outcome::Panicked {
            deployment_id,
            message,
        } => output.error(&format!("Deployment {} aborted: {}", deployment_id, message)),
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(e) => {
            warn!(error = %e, "cannot listen for SIGTERM, only Ctrl-C stops the worker");
            wait_for_ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = wait_for_ctrl_c() => {}
        _ = terminate.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    wait_for_ctrl_c().await;
}

async fn wait_for_ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "cannot listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}
