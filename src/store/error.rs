// ABOUTME: Error types for the deployment store.
// ABOUTME: Separates missing records and illegal transitions from backend failures.

use crate::model::DeploymentStatus;
use crate::types::DeploymentId;

/// Errors surfaced by [`DeploymentStore`](super::DeploymentStore) implementations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The status change would move a deployment backwards or skip a state.
    #[error("deployment {id}: cannot move from {from} to {to}")]
    InvalidTransition {
        id: DeploymentId,
        from: DeploymentStatus,
        to: DeploymentStatus,
    },

    /// `failed` can only be entered together with an error message.
    #[error("deployment {0}: failed status requires an error message")]
    MessageRequired(DeploymentId),

    /// A stored value could not be interpreted.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// The backend could not be reached.
    #[error("connection error: {0}")]
    Connection(String),

    /// A statement failed.
    #[error("query error: {0}")]
    Query(String),
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
    NotFound,
    InvalidTransition,
    InvalidData,
    Unavailable,
}

impl StoreError {
    pub fn kind(&self) -> StoreErrorKind {
        match self {
            StoreError::NotFound(_) => StoreErrorKind::NotFound,
            StoreError::InvalidTransition { .. } | StoreError::MessageRequired(_) => {
                StoreErrorKind::InvalidTransition
            }
            StoreError::InvalidData(_) => StoreErrorKind::InvalidData,
            StoreError::Connection(_) | StoreError::Query(_) => StoreErrorKind::Unavailable,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == StoreErrorKind::NotFound
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
