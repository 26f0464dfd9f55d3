// ABOUTME: Enqueue command: queues a pending deployment for an app.

use super::connection::connect_store;
use dockyard::config::Config;
use dockyard::error::Result;
use dockyard::output::Output;
use dockyard::store::DeploymentStore;
use dockyard::types::AppId;

pub async fn enqueue(config: Config, app_id: AppId, output: Output) -> Result<()> {
    let store = connect_store(&config, &output).await?;
    let deployment = store.create_deployment(app_id).await?;
    let queued = store.list_pending().await?.len();

    output.record(&deployment, || {
        output.success(&format!(
            "Queued deployment {} for app {} ({} pending)",
            deployment.id, app_id, queued
        ));
    });
    Ok(())
}
