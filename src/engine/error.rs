// ABOUTME: Error types for the deployment engine.
// ABOUTME: Loop-level infra failures and fatal bookkeeping failures for one deployment.

use crate::store::StoreError;
use crate::types::{AppId, DeploymentId};

/// Errors that stop the engine from making progress on one iteration.
///
/// Step failures (clone, build, launch) are not errors here: they are
/// recorded on the deployment and reported as [`Outcome::Failed`](super::Outcome::Failed).
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The build lock could not be queried.
    #[error("failed to acquire build lock: {0}")]
    Lock(#[source] StoreError),

    /// The queue could not be read.
    #[error("failed to dequeue deployment: {0}")]
    Dequeue(#[source] StoreError),

    /// A claimed deployment could not be reloaded.
    #[error("failed to load deployment {id}: {source}")]
    LoadDeployment {
        id: DeploymentId,
        #[source]
        source: StoreError,
    },

    /// The deployment's app could not be loaded.
    #[error("failed to load app {id}: {source}")]
    LoadApp {
        id: AppId,
        #[source]
        source: StoreError,
    },

    /// A bookkeeping update the deployment depends on was not stored.
    #[error("failed to persist {field} for deployment {id}: {source}")]
    Persist {
        id: DeploymentId,
        field: &'static str,
        #[source]
        source: StoreError,
    },
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineErrorKind {
    /// No deployment was claimed; retrying later is safe.
    Transient,
    /// Stored records disagree with each other.
    Consistency,
    /// A claimed deployment's bookkeeping could not be written.
    Persistence,
}

impl EngineError {
    pub fn kind(&self) -> EngineErrorKind {
        match self {
            EngineError::Lock(_) | EngineError::Dequeue(_) => EngineErrorKind::Transient,
            EngineError::LoadDeployment { .. } | EngineError::LoadApp { .. } => {
                EngineErrorKind::Consistency
            }
            EngineError::Persist { .. } => EngineErrorKind::Persistence,
        }
    }
}
