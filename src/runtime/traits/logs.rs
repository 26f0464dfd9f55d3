// ABOUTME: Log operations trait for container runtimes.
// ABOUTME: Fetches a container's raw, still-multiplexed log buffer.

use crate::types::ContainerId;
use async_trait::async_trait;
use bytes::Bytes;

/// Log retrieval operations.
#[async_trait]
pub trait LogOps: Send + Sync {
    /// Fetch stdout and stderr exactly as the runtime sends them.
    ///
    /// For containers without a TTY the buffer is framed with 8-byte stream
    /// headers; see [`crate::logs::demux_runtime_log`]. `tail` limits the
    /// result to the last N lines per stream.
    async fn raw_logs(&self, id: &ContainerId, tail: Option<u64>) -> Result<Bytes, LogError>;
}

/// Errors from log operations.
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("container not found: {0}")]
    ContainerNotFound(String),

    #[error("stream error: {0}")]
    StreamError(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}
