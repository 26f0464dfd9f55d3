// ABOUTME: Shared helpers for opening the database and container runtime connections.
// ABOUTME: Keeps the worker and the one-shot commands connecting the same way.

use dockyard::config::Config;
use dockyard::error::{Error, Result};
use dockyard::model::Deployment;
use dockyard::output::Output;
use dockyard::runtime::{self, BollardRuntime, RuntimeInfo};
use dockyard::store::{DeploymentStore, PgStore};
use dockyard::types::{ContainerId, DeploymentId};

/// Open the PostgreSQL pool described by `config`.
pub async fn connect_store(config: &Config, output: &Output) -> Result<PgStore> {
    let url = config.database_url()?;
    output.progress("  → Connecting to database...");
    let store = PgStore::connect(
        &url,
        config.database.max_connections,
        config.database.acquire_timeout,
    )
    .await?;
    Ok(store)
}

/// Detect the local container runtime and connect to it.
pub async fn connect_runtime(config: &Config, output: &Output) -> Result<BollardRuntime> {
    output.progress("  → Detecting runtime...");
    let runtime = runtime::connect(&config.runtime).await?;

    match runtime.info().await {
        Ok(metadata) => output.progress(&format!(
            "  → Found {} {}",
            runtime.runtime_type(),
            metadata.version
        )),
        Err(e) => tracing::debug!(error = %e, "runtime metadata unavailable"),
    }

    Ok(runtime)
}

/// Look up a deployment and the container it launched.
pub async fn deployment_container(
    store: &PgStore,
    id: DeploymentId,
) -> Result<(Deployment, ContainerId)> {
    let deployment = store.get_deployment(id).await?;
    let container = deployment
        .container_id
        .clone()
        .map(ContainerId::new)
        .ok_or(Error::NoContainer(id))?;
    Ok((deployment, container))
}
