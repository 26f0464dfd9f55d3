// ABOUTME: Repository fetcher: materializes one branch into a per-deployment directory.
// ABOUTME: Defines the fetcher contract, the checkout handle, and the Dockerfile precondition.

mod error;
mod git;

pub use error::{FetchError, FetchErrorKind, MISSING_BUILD_DESCRIPTOR};
pub use git::GitFetcher;

use crate::types::DeploymentId;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// File that must exist at the root of every checkout.
pub const BUILD_DESCRIPTOR: &str = "Dockerfile";

/// A local checkout owned by one deployment.
///
/// Directories created by a fetcher are removed when the handle drops.
#[derive(Debug)]
pub struct Checkout {
    path: PathBuf,
    _dir: Option<TempDir>,
}

impl Checkout {
    /// Checkout backed by a temporary directory, deleted on drop.
    pub fn temporary(dir: TempDir) -> Self {
        Self {
            path: dir.path().to_path_buf(),
            _dir: Some(dir),
        }
    }

    /// Checkout at a caller-managed path that is left in place.
    pub fn borrowed(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _dir: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Produces isolated checkouts of a repository branch.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Fetch `branch` of `repo_url` into a directory no other deployment uses.
    async fn fetch(
        &self,
        repo_url: &str,
        deployment_id: DeploymentId,
        branch: &str,
    ) -> Result<Checkout, FetchError>;
}

/// Check that a checkout carries a Dockerfile at its root.
pub fn ensure_build_descriptor(checkout: &Checkout) -> Result<(), FetchError> {
    if checkout.path().join(BUILD_DESCRIPTOR).is_file() {
        Ok(())
    } else {
        Err(FetchError::MissingBuildDescriptor)
    }
}
