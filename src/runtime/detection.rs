// ABOUTME: Runtime socket detection on the local system.
// ABOUTME: Honors explicit config, then checks Podman sockets before Docker.

use super::types::{RuntimeConfig, RuntimeEndpoint, RuntimeType};
use std::path::Path;

/// Error during runtime detection.
#[derive(Debug, thiserror::Error)]
pub enum DetectionError {
    #[error("no container runtime found (checked Podman and Docker sockets)")]
    NoRuntimeFound,

    #[error("configured {runtime} socket does not exist: {path}")]
    SocketNotFound { runtime: RuntimeType, path: String },
}

const ROOTFUL_PODMAN: &str = "/run/podman/podman.sock";
const DOCKER_SOCKET: &str = "/var/run/docker.sock";

/// Detect container runtime on the local system.
///
/// Detection order:
/// 1. Rootless Podman socket (`/run/user/$UID/podman/podman.sock`)
/// 2. Rootful Podman socket (`/run/podman/podman.sock`)
/// 3. Docker socket (`/var/run/docker.sock`)
pub fn detect_local() -> Result<RuntimeEndpoint, DetectionError> {
    // 1. Rootless Podman
    if let Some(uid) = get_uid() {
        let rootless_socket = format!("/run/user/{}/podman/podman.sock", uid);
        if Path::new(&rootless_socket).exists() {
            return Ok(RuntimeEndpoint {
                runtime_type: RuntimeType::Podman,
                socket_path: rootless_socket,
            });
        }
    }

    // 2. Rootful Podman
    if Path::new(ROOTFUL_PODMAN).exists() {
        return Ok(RuntimeEndpoint {
            runtime_type: RuntimeType::Podman,
            socket_path: ROOTFUL_PODMAN.to_string(),
        });
    }

    // 3. Docker
    if Path::new(DOCKER_SOCKET).exists() {
        return Ok(RuntimeEndpoint {
            runtime_type: RuntimeType::Docker,
            socket_path: DOCKER_SOCKET.to_string(),
        });
    }

    Err(DetectionError::NoRuntimeFound)
}

/// Resolve the runtime endpoint from config, falling back to detection.
///
/// An explicit runtime type without a socket uses that runtime's default
/// socket. An explicit socket must exist.
pub fn resolve_runtime(config: &RuntimeConfig) -> Result<RuntimeEndpoint, DetectionError> {
    let Some(runtime_type) = config.runtime else {
        if let Some(socket) = &config.socket {
            return checked(RuntimeType::Docker, socket.clone());
        }
        return detect_local();
    };

    let socket_path = config
        .socket
        .clone()
        .unwrap_or_else(|| default_socket_path(runtime_type));
    checked(runtime_type, socket_path)
}

fn checked(runtime_type: RuntimeType, socket_path: String) -> Result<RuntimeEndpoint, DetectionError> {
    if !Path::new(&socket_path).exists() {
        return Err(DetectionError::SocketNotFound {
            runtime: runtime_type,
            path: socket_path,
        });
    }
    Ok(RuntimeEndpoint {
        runtime_type,
        socket_path,
    })
}

fn get_uid() -> Option<String> {
    std::env::var("UID").ok().or_else(|| {
        std::fs::read_to_string("/proc/self/status")
            .ok()
            .and_then(|s| {
                s.lines()
                    .find(|l| l.starts_with("Uid:"))
                    .and_then(|l| l.split_whitespace().nth(1))
                    .map(|s| s.to_string())
            })
    })
}

fn default_socket_path(runtime: RuntimeType) -> String {
    match runtime {
        RuntimeType::Docker => DOCKER_SOCKET.to_string(),
        RuntimeType::Podman => ROOTFUL_PODMAN.to_string(),
    }
}
