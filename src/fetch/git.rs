// ABOUTME: Fetcher that shells out to the git CLI for shallow single-branch clones.
// ABOUTME: Classifies clone failures from git's stderr.

use super::{Checkout, FetchError, SourceFetcher};
use crate::types::DeploymentId;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

/// Clones repositories with the `git` binary into per-deployment temp dirs.
#[derive(Debug, Clone)]
pub struct GitFetcher {
    work_dir: PathBuf,
    program: PathBuf,
}

impl GitFetcher {
    /// Fetcher that places checkouts under `work_dir`.
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            program: PathBuf::from("git"),
        }
    }

    /// Use a specific git executable instead of the one on `PATH`.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    fn prepare_dir(&self, deployment_id: DeploymentId) -> Result<tempfile::TempDir, FetchError> {
        std::fs::create_dir_all(&self.work_dir).map_err(|source| FetchError::Filesystem {
            path: self.work_dir.clone(),
            source,
        })?;

        tempfile::Builder::new()
            .prefix(&format!("deployment-{}-", deployment_id))
            .tempdir_in(&self.work_dir)
            .map_err(|source| FetchError::Filesystem {
                path: self.work_dir.clone(),
                source,
            })
    }
}

#[async_trait]
impl SourceFetcher for GitFetcher {
    async fn fetch(
        &self,
        repo_url: &str,
        deployment_id: DeploymentId,
        branch: &str,
    ) -> Result<Checkout, FetchError> {
        let dir = self.prepare_dir(deployment_id)?;
        debug!(path = %dir.path().display(), "cloning into checkout directory");

        let output = Command::new(&self.program)
            .args(["clone", "--depth", "1", "--single-branch", "--branch"])
            .arg(branch)
            .arg("--")
            .arg(repo_url)
            .arg(dir.path())
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| FetchError::Filesystem {
                path: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_clone_failure(repo_url, branch, &stderr));
        }

        info!(repo = repo_url, branch, "repository cloned");
        Ok(Checkout::temporary(dir))
    }
}

/// Map git's stderr for a failed clone onto a [`FetchError`].
fn classify_clone_failure(url: &str, branch: &str, stderr: &str) -> FetchError {
    let lower = stderr.to_lowercase();

    if lower.contains("remote branch") || lower.contains("couldn't find remote ref") {
        return FetchError::BranchNotFound {
            url: url.to_string(),
            branch: branch.to_string(),
        };
    }

    if lower.contains("could not create") || lower.contains("no space left") {
        return FetchError::Filesystem {
            path: PathBuf::from(url),
            source: std::io::Error::other(last_line(stderr)),
        };
    }

    FetchError::Unreachable {
        url: url.to_string(),
        message: last_line(stderr),
    }
}

/// Last non-empty line of git's output, which carries the fatal reason.
fn last_line(stderr: &str) -> String {
    stderr
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .next_back()
        .unwrap_or("git clone failed")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FetchErrorKind;

    const URL: &str = "https://example.com/blog.git";

    #[test]
    fn missing_branch_is_classified() {
        let stderr = "Cloning into '/tmp/x'...\nwarning: Could not find remote branch develop to clone.\nfatal: Remote branch develop not found in upstream origin\n";
        let err = classify_clone_failure(URL, "develop", stderr);
        assert_eq!(err.kind(), FetchErrorKind::BranchNotFound);
    }

    #[test]
    fn unresolvable_host_is_unreachable() {
        let stderr = "Cloning into '/tmp/x'...\nfatal: unable to access 'https://nope.invalid/': Could not resolve host: nope.invalid\n";
        let err = classify_clone_failure(URL, "main", stderr);
        assert_eq!(err.kind(), FetchErrorKind::Unreachable);
        assert!(err.to_string().contains("Could not resolve host"));
    }

    #[test]
    fn auth_failure_is_unreachable() {
        let stderr = "fatal: Authentication failed for 'https://example.com/blog.git/'\n";
        assert_eq!(
            classify_clone_failure(URL, "main", stderr).kind(),
            FetchErrorKind::Unreachable
        );
    }

    #[test]
    fn local_write_failure_is_filesystem() {
        let stderr = "fatal: could not create work tree dir '/ro/x': Read-only file system\n";
        assert_eq!(
            classify_clone_failure(URL, "main", stderr).kind(),
            FetchErrorKind::Filesystem
        );
    }

    #[test]
    fn empty_stderr_still_produces_a_message() {
        let err = classify_clone_failure(URL, "main", "");
        assert!(err.to_string().contains("git clone failed"));
    }
}
