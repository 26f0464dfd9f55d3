// ABOUTME: Container launcher: creates and starts a deployment's container with routing labels.
// ABOUTME: Labels follow the Traefik docker provider; the app must listen on the routed port.

use crate::runtime::{ContainerConfig, ContainerError, ContainerOps, RestartPolicyConfig};
use crate::types::{ContainerId, DeploymentId, ImageRef, Subdomain};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{info, warn};

/// Port every deployed app must listen on.
pub const APP_PORT: u16 = 8080;

/// Label marking containers this system created.
pub const MANAGED_LABEL: &str = "dockyard.managed";
pub const SUBDOMAIN_LABEL: &str = "dockyard.subdomain";
pub const DEPLOYMENT_LABEL: &str = "dockyard.deployment";

/// How launched containers are wired into the reverse proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSettings {
    /// Shared network the proxy also joins.
    pub network: String,
    /// Name of the proxy's certificate resolver.
    pub cert_resolver: String,
    /// Proxy entrypoint the router binds to.
    pub entrypoint: String,
    pub restart_policy: RestartPolicyConfig,
}

impl Default for LaunchSettings {
    fn default() -> Self {
        Self {
            network: "dockyard".to_string(),
            cert_resolver: "letsencrypt".to_string(),
            entrypoint: "websecure".to_string(),
            restart_policy: RestartPolicyConfig::UnlessStopped,
        }
    }
}

/// Errors from launching a container.
#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("failed to create container: {0}")]
    Create(#[source] ContainerError),

    #[error("failed to start container {id}: {source}")]
    Start {
        id: ContainerId,
        #[source]
        source: ContainerError,
    },
}

/// Reverse-proxy labels routing `{subdomain}.{base_domain}` to the container.
pub fn routing_labels(
    subdomain: &Subdomain,
    base_domain: &str,
    settings: &LaunchSettings,
) -> HashMap<String, String> {
    let router = format!("traefik.http.routers.{}", subdomain);
    let service = format!("traefik.http.services.{}", subdomain);

    HashMap::from([
        ("traefik.enable".to_string(), "true".to_string()),
        (
            format!("{}.rule", router),
            format!("Host(`{}`)", subdomain.host(base_domain)),
        ),
        (format!("{}.entrypoints", router), settings.entrypoint.clone()),
        (format!("{}.tls", router), "true".to_string()),
        (
            format!("{}.tls.certresolver", router),
            settings.cert_resolver.clone(),
        ),
        (
            format!("{}.loadbalancer.server.port", service),
            APP_PORT.to_string(),
        ),
        ("traefik.docker.network".to_string(), settings.network.clone()),
    ])
}

/// Container configuration for one deployment.
///
/// The container is named after the subdomain, which is unique per deployment.
pub fn container_config(
    image: &ImageRef,
    subdomain: &Subdomain,
    deployment_id: DeploymentId,
    base_domain: &str,
    settings: &LaunchSettings,
) -> ContainerConfig {
    let mut labels = routing_labels(subdomain, base_domain, settings);
    labels.insert(MANAGED_LABEL.to_string(), "true".to_string());
    labels.insert(SUBDOMAIN_LABEL.to_string(), subdomain.to_string());
    labels.insert(DEPLOYMENT_LABEL.to_string(), deployment_id.to_string());

    let mut config = ContainerConfig::new(subdomain.as_str(), image.clone());
    config.labels = labels;
    config.exposed_ports = vec![APP_PORT];
    config.network = Some(settings.network.clone());
    config.restart_policy = settings.restart_policy;
    config
}

/// Create and start a deployment's container, returning its runtime id.
///
/// If the container is created but fails to start, it is removed again so
/// its name does not linger.
pub async fn launch<R>(
    runtime: &R,
    image: &ImageRef,
    subdomain: &Subdomain,
    deployment_id: DeploymentId,
    base_domain: &str,
    settings: &LaunchSettings,
) -> Result<ContainerId, LaunchError>
where
    R: ContainerOps + ?Sized,
{
    let config = container_config(image, subdomain, deployment_id, base_domain, settings);

    let id = runtime
        .create_container(&config)
        .await
        .map_err(LaunchError::Create)?;

    if let Err(source) = runtime.start_container(&id).await {
        if let Err(e) = runtime.remove_container(&id, true).await {
            warn!(container = %id, error = %e, "failed to remove container that did not start");
        }
        return Err(LaunchError::Start { id, source });
    }

    info!(container = %id, host = %subdomain.host(base_domain), "container started");
    Ok(id)
}

/// What [`teardown`] found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Teardown {
    /// The container was stopped if needed, then removed.
    Removed,
    /// The runtime no longer knows the container.
    AlreadyGone,
}

/// Errors from tearing a deployment's container down.
#[derive(Debug, thiserror::Error)]
pub enum TeardownError {
    #[error("container {id} is not labelled for deployment {expected} (found {found:?})")]
    ForeignContainer {
        id: ContainerId,
        expected: DeploymentId,
        found: Option<String>,
    },

    #[error("failed to inspect container {id}: {source}")]
    Inspect {
        id: ContainerId,
        #[source]
        source: ContainerError,
    },

    #[error("failed to stop container {id}: {source}")]
    Stop {
        id: ContainerId,
        #[source]
        source: ContainerError,
    },

    #[error("failed to remove container {id}: {source}")]
    Remove {
        id: ContainerId,
        #[source]
        source: ContainerError,
    },
}

/// Stop and remove the container launched for `deployment_id`.
///
/// The container must carry this deployment's label; anything else is left
/// untouched. A container that is already gone counts as torn down.
pub async fn teardown<R>(
    runtime: &R,
    id: &ContainerId,
    deployment_id: DeploymentId,
    timeout: Duration,
) -> Result<Teardown, TeardownError>
where
    R: ContainerOps + ?Sized,
{
    let info = match runtime.inspect_container(id).await {
        Ok(info) => info,
        Err(e) if e.is_not_found() => {
            info!(container = %id, "container already removed");
            return Ok(Teardown::AlreadyGone);
        }
        Err(source) => {
            return Err(TeardownError::Inspect {
                id: id.clone(),
                source,
            });
        }
    };

    let expected = deployment_id.to_string();
    let found = info.labels.get(DEPLOYMENT_LABEL);
    if found != Some(&expected) {
        return Err(TeardownError::ForeignContainer {
            id: id.clone(),
            expected: deployment_id,
            found: found.cloned(),
        });
    }

    if info.state.is_active() {
        stop(runtime, id, timeout)
            .await
            .map_err(|source| TeardownError::Stop {
                id: id.clone(),
                source,
            })?;
    }

    remove(runtime, id)
        .await
        .map_err(|source| TeardownError::Remove {
            id: id.clone(),
            source,
        })?;

    info!(container = %id, "container removed");
    Ok(Teardown::Removed)
}

/// Stop a container, treating an already-stopped container as success.
pub async fn stop<R>(runtime: &R, id: &ContainerId, timeout: Duration) -> Result<(), ContainerError>
where
    R: ContainerOps + ?Sized,
{
    match runtime.stop_container(id, timeout).await {
        Ok(()) | Err(ContainerError::NotRunning(_)) => Ok(()),
        Err(e) => Err(e),
    }
}

/// Remove a container, treating an already-removed container as success.
pub async fn remove<R>(runtime: &R, id: &ContainerId) -> Result<(), ContainerError>
where
    R: ContainerOps + ?Sized,
{
    match runtime.remove_container(id, true).await {
        Ok(()) | Err(ContainerError::NotFound(_)) => Ok(()),
        Err(e) => Err(e),
    }
}
