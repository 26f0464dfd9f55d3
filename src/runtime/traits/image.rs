// ABOUTME: Image operations trait for container runtimes.
// ABOUTME: Build from a context archive and check whether a tag exists.

use crate::types::ImageRef;
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

/// Progress of an image build, in runtime order.
///
/// The stream may borrow the runtime that produced it.
pub type BuildStream<'a> = Pin<Box<dyn Stream<Item = Result<BuildEvent, ImageError>> + Send + 'a>>;

/// One item reported by the runtime while building.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildEvent {
    /// A chunk of build output, possibly several lines.
    Output(String),
    /// A build instruction failed; the build stops here.
    Failed(String),
}

/// Image operations: build and check existence.
#[async_trait]
pub trait ImageOps: Send + Sync {
    /// Build an image from a tar build context, tagging it `tag`.
    ///
    /// The context must contain a `Dockerfile` at its root. Build output is
    /// reported through the returned stream; a stream item of `Err` means the
    /// output could not be read, not that the build failed.
    async fn build_image<'a>(
        &'a self,
        context: Vec<u8>,
        tag: &ImageRef,
    ) -> Result<BuildStream<'a>, ImageError>;

    /// Check if an image exists locally.
    async fn image_exists(&self, reference: &ImageRef) -> Result<bool, ImageError>;
}

/// Errors from image operations.
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("runtime error: {0}")]
    Runtime(String),
}
