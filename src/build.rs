// ABOUTME: Image builder: archives a checkout into a build context and drives the runtime build.
// ABOUTME: Keeps the collected build log on both success and failure.

use crate::logs::collect_build_log;
use crate::runtime::{ImageError, ImageOps};
use crate::types::ImageRef;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Directories never sent to the runtime as build context.
const EXCLUDED_DIRS: &[&str] = &[".git"];

/// A successfully built image.
#[derive(Debug, Clone)]
pub struct BuiltImage {
    pub image: ImageRef,
    pub log: String,
    /// Set when the build output could not be read to the end.
    pub log_read_error: Option<String>,
}

/// Errors from building an image.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("failed to assemble build context: {0}")]
    Context(#[source] io::Error),

    #[error("failed to start image build: {0}")]
    Runtime(#[source] ImageError),

    #[error("image build failed: {message}")]
    StepFailed { message: String, log: String },

    #[error("image build did not complete: {message}")]
    Incomplete { message: String, log: String },
}

impl BuildError {
    /// Build output collected before the failure, if the build got that far.
    pub fn log(&self) -> Option<&str> {
        match self {
            BuildError::StepFailed { log, .. } | BuildError::Incomplete { log, .. } => {
                Some(log.as_str())
            }
            BuildError::Context(_) | BuildError::Runtime(_) => None,
        }
    }
}

/// Archive `dir` as a tar build context.
///
/// Paths are stored relative to `dir`; symlinks are archived as links, and
/// `.git` is skipped.
pub fn create_build_context(dir: &Path) -> io::Result<Vec<u8>> {
    let mut ar = tar::Builder::new(Vec::new());
    ar.follow_symlinks(false);
    append_dir(&mut ar, dir, Path::new(""))?;
    ar.into_inner()
}

fn append_dir(ar: &mut tar::Builder<Vec<u8>>, root: &Path, rel: &Path) -> io::Result<()> {
    let mut entries: Vec<_> = std::fs::read_dir(root.join(rel))?.collect::<Result<_, _>>()?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let name = entry.file_name();
        let rel_path = rel.join(&name);
        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            if rel.as_os_str().is_empty() && EXCLUDED_DIRS.iter().any(|d| name == *d) {
                continue;
            }
            ar.append_dir(&rel_path, entry.path())?;
            append_dir(ar, root, &rel_path)?;
        } else {
            ar.append_path_with_name(entry.path(), &rel_path)?;
        }
    }
    Ok(())
}

/// Build `dir` into an image tagged `tag`.
///
/// A build whose output stream breaks off is still treated as successful if
/// the tagged image exists afterwards.
pub async fn build_image<R>(runtime: &R, dir: &Path, tag: &ImageRef) -> Result<BuiltImage, BuildError>
where
    R: ImageOps + ?Sized,
{
    let context_dir: PathBuf = dir.to_path_buf();
    let context = tokio::task::spawn_blocking(move || create_build_context(&context_dir))
        .await
        .map_err(|e| BuildError::Context(io::Error::other(e)))?
        .map_err(BuildError::Context)?;
    debug!(bytes = context.len(), "build context assembled");

    let stream = runtime
        .build_image(context, tag)
        .await
        .map_err(BuildError::Runtime)?;
    let collected = collect_build_log(stream).await;

    if let Some(message) = collected.failure {
        return Err(BuildError::StepFailed {
            message,
            log: collected.log,
        });
    }

    if let Some(read_error) = &collected.read_error {
        warn!(image = %tag, error = %read_error, "build output ended early");
        match runtime.image_exists(tag).await {
            Ok(true) => {}
            Ok(false) => {
                return Err(BuildError::Incomplete {
                    message: read_error.clone(),
                    log: collected.log,
                });
            }
            Err(e) => {
                return Err(BuildError::Incomplete {
                    message: format!("{}; {}", read_error, e),
                    log: collected.log,
                });
            }
        }
    }

    info!(image = %tag, "image built");
    Ok(BuiltImage {
        image: tag.clone(),
        log: collected.log,
        log_read_error: collected.read_error,
    })
}
