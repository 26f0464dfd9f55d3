// ABOUTME: Logs command: fetches a deployment container's raw logs and demultiplexes them.

use super::connection::{connect_runtime, connect_store, deployment_container};
use dockyard::config::Config;
use dockyard::error::Result;
use dockyard::logs::demux_runtime_log;
use dockyard::output::Output;
use dockyard::runtime::LogOps;
use dockyard::types::DeploymentId;

pub async fn logs(config: Config, id: DeploymentId, tail: Option<u64>, output: Output) -> Result<()> {
    let store = connect_store(&config, &output).await?;
    let (_, container) = deployment_container(&store, id).await?;

    let runtime = connect_runtime(&config, &output).await?;
    let raw = runtime.raw_logs(&container, tail).await?;

    let demuxed = demux_runtime_log(&raw);
    output.record(&demuxed.lines, || {
        for line in &demuxed.lines {
            println!("{}", line);
        }
    });

    if let Some(e) = demuxed.error {
        output.warning(&format!("log stream ended early: {}", e));
    }
    Ok(())
}
