// ABOUTME: Teardown command: stops and removes a deployment's container.
// ABOUTME: Only a container labelled for the deployment is touched; the record keeps its status.

use super::connection::{connect_runtime, connect_store, deployment_container};
use dockyard::config::Config;
use dockyard::error::Result;
use dockyard::launch::{self, Teardown};
use dockyard::output::Output;
use dockyard::types::DeploymentId;
use std::time::Duration;

pub async fn teardown(
    config: Config,
    id: DeploymentId,
    timeout: Duration,
    mut output: Output,
) -> Result<()> {
    output.start_timer();

    let store = connect_store(&config, &output).await?;
    let (_, container) = deployment_container(&store, id).await?;
    let runtime = connect_runtime(&config, &output).await?;

    output.progress(&format!("  → Removing container {}...", container));
    match launch::teardown(&runtime, &container, id, timeout).await? {
        Teardown::Removed => output.success(&format!("Deployment {} torn down", id)),
        Teardown::AlreadyGone => {
            output.warning(&format!("Container {} was already gone", container));
            output.success(&format!("Deployment {} torn down", id));
        }
    }
    Ok(())
}
