// ABOUTME: Integration tests for the git-backed source fetcher.
// ABOUTME: Clones throwaway local repositories; skips when git is not installed.

mod support;

use dockyard::fetch::{FetchErrorKind, GitFetcher, SourceFetcher, ensure_build_descriptor};
use dockyard::types::DeploymentId;
use std::path::{Path, PathBuf};
use std::process::Command;

fn git(dir: &Path, args: &[&str]) {
    let status = Command::new("git")
        .args(["-c", "user.name=Dockyard Test", "-c", "user.email=test@example.com"])
        .args(args)
        .current_dir(dir)
        .status()
        .expect("git runs");
    assert!(status.success(), "git {:?} failed", args);
}

/// A repository with a Dockerfile on `main` and none on `docs`.
fn sample_repo() -> Option<(tempfile::TempDir, String)> {
    if Command::new("git").arg("--version").output().is_err() {
        eprintln!("Skipping test: git is not installed");
        return None;
    }

    let dir = tempfile::tempdir().unwrap();
    let repo = dir.path();
    git(repo, &["init", "--quiet"]);
    git(repo, &["symbolic-ref", "HEAD", "refs/heads/main"]);
    std::fs::write(repo.join("Dockerfile"), "FROM scratch\n").unwrap();
    std::fs::write(repo.join("index.html"), "<h1>hello</h1>\n").unwrap();
    git(repo, &["add", "."]);
    git(repo, &["commit", "--quiet", "-m", "initial"]);

    git(repo, &["checkout", "--quiet", "-b", "docs"]);
    git(repo, &["rm", "--quiet", "Dockerfile"]);
    git(repo, &["commit", "--quiet", "-m", "docs only"]);
    git(repo, &["checkout", "--quiet", "main"]);

    let url = format!("file://{}", repo.display());
    Some((dir, url))
}

macro_rules! require_repo {
    () => {
        match sample_repo() {
            Some(repo) => repo,
            None => return,
        }
    };
}

fn fetcher() -> (tempfile::TempDir, GitFetcher) {
    support::init_tracing();
    let work = tempfile::tempdir().unwrap();
    let fetcher = GitFetcher::new(work.path().join("checkouts"));
    (work, fetcher)
}

#[tokio::test]
async fn clones_the_requested_branch() {
    let (_repo, url) = require_repo!();
    let (_work, fetcher) = fetcher();

    let checkout = fetcher
        .fetch(&url, DeploymentId::new(7), "main")
        .await
        .expect("clone should succeed");

    assert!(checkout.path().join("index.html").is_file());
    ensure_build_descriptor(&checkout).expect("main has a Dockerfile");
    assert!(checkout.path().starts_with(fetcher.work_dir()));
    let dir_name = checkout.path().file_name().unwrap().to_string_lossy().to_string();
    assert!(dir_name.starts_with("deployment-7-"), "{}", dir_name);
}

#[tokio::test]
async fn branch_without_dockerfile_fails_the_check() {
    let (_repo, url) = require_repo!();
    let (_work, fetcher) = fetcher();

    let checkout = fetcher
        .fetch(&url, DeploymentId::new(1), "docs")
        .await
        .expect("clone should succeed");

    let err = ensure_build_descriptor(&checkout).unwrap_err();
    assert_eq!(err.kind(), FetchErrorKind::MissingBuildDescriptor);
}

#[tokio::test]
async fn missing_branch_is_classified() {
    let (_repo, url) = require_repo!();
    let (_work, fetcher) = fetcher();

    let err = fetcher
        .fetch(&url, DeploymentId::new(1), "no-such-branch")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), FetchErrorKind::BranchNotFound);
    assert!(err.to_string().starts_with("failed to clone"));
}

#[tokio::test]
async fn missing_repository_is_unreachable() {
    let (repo, _url) = require_repo!();
    let (_work, fetcher) = fetcher();
    let url = format!("file://{}", repo.path().join("does-not-exist").display());

    let err = fetcher.fetch(&url, DeploymentId::new(1), "main").await.unwrap_err();
    assert_eq!(err.kind(), FetchErrorKind::Unreachable);
    assert!(err.is_retryable());
}

#[tokio::test]
async fn checkouts_are_isolated_and_removed_on_drop() {
    let (_repo, url) = require_repo!();
    let (_work, fetcher) = fetcher();

    let first = fetcher.fetch(&url, DeploymentId::new(1), "main").await.unwrap();
    let second = fetcher.fetch(&url, DeploymentId::new(1), "main").await.unwrap();
    assert_ne!(first.path(), second.path());

    let path: PathBuf = first.path().to_path_buf();
    drop(first);
    assert!(!path.exists(), "checkout should be deleted on drop");
    assert!(second.path().exists());
}

#[tokio::test]
async fn missing_git_binary_is_a_filesystem_error() {
    let (_work, fetcher) = fetcher();
    let fetcher = fetcher.with_program("/nonexistent/dockyard-git");

    let err = fetcher
        .fetch("file:///tmp/whatever", DeploymentId::new(1), "main")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), FetchErrorKind::Filesystem);
}
