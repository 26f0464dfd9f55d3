// ABOUTME: Container runtime adapter for Docker and Podman.
// ABOUTME: Capability traits, socket detection, and the bollard-backed implementation.

mod bollard;
mod detection;
mod error;
pub mod traits;
mod types;

pub use self::bollard::BollardRuntime;
pub use detection::{DetectionError, detect_local, resolve_runtime};
pub use error::{RuntimeError, RuntimeErrorKind};
pub use traits::{
    BuildEvent, BuildStream, ContainerConfig, ContainerError, ContainerInfo, ContainerOps,
    ContainerState, ImageError, ImageOps, LogError, LogOps, RestartPolicyConfig, RuntimeInfo,
    RuntimeInfoError, RuntimeMetadata,
};
pub use types::{RuntimeConfig, RuntimeEndpoint, RuntimeType};

/// Resolve the configured runtime and open a verified connection to it.
pub async fn connect(config: &RuntimeConfig) -> Result<BollardRuntime, RuntimeError> {
    let endpoint = resolve_runtime(config)?;
    let runtime = BollardRuntime::connect(&endpoint)?;
    runtime.ping().await?;
    tracing::debug!(
        runtime = %endpoint.runtime_type,
        socket = %endpoint.socket_path,
        "connected to container runtime"
    );
    Ok(runtime)
}
