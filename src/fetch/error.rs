// ABOUTME: Classified failures from materializing a repository checkout.
// ABOUTME: Keeps unreachable, missing-branch, and local I/O causes apart for retry policy.

use std::path::PathBuf;

/// Message stored on a deployment whose checkout has no Dockerfile at its root.
pub const MISSING_BUILD_DESCRIPTOR: &str = "Dockerfile is not available in the repository root directory. Add a Dockerfile to the root of the branch and redeploy.";

/// Errors from [`SourceFetcher`](super::SourceFetcher) implementations.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The remote could not be reached, or refused our credentials.
    #[error("failed to clone {url}: {message}")]
    Unreachable { url: String, message: String },

    /// The remote exists but has no such branch.
    #[error("failed to clone {url}: branch '{branch}' not found")]
    BranchNotFound { url: String, branch: String },

    /// The local working directory could not be prepared.
    #[error("failed to prepare checkout at {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The checkout has no build descriptor in its root.
    #[error("{MISSING_BUILD_DESCRIPTOR}")]
    MissingBuildDescriptor,
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    Unreachable,
    BranchNotFound,
    Filesystem,
    MissingBuildDescriptor,
}

impl FetchError {
    pub fn kind(&self) -> FetchErrorKind {
        match self {
            FetchError::Unreachable { .. } => FetchErrorKind::Unreachable,
            FetchError::BranchNotFound { .. } => FetchErrorKind::BranchNotFound,
            FetchError::Filesystem { .. } => FetchErrorKind::Filesystem,
            FetchError::MissingBuildDescriptor => FetchErrorKind::MissingBuildDescriptor,
        }
    }

    /// Whether trying again later could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            FetchErrorKind::Unreachable | FetchErrorKind::Filesystem
        )
    }
}
