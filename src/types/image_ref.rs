// ABOUTME: Local container image reference and the per-deployment tag scheme.
// ABOUTME: Handles `name` and `name:tag`; images never leave the build host.

use super::id::DeploymentId;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseImageRefError {
    #[error("image reference cannot be empty")]
    Empty,

    #[error("invalid character in image reference: {0:?}")]
    InvalidChar(char),

    #[error("invalid image reference format: {0}")]
    InvalidFormat(String),
}

/// An image on the local runtime, e.g. `dockyard-blog:42`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    name: String,
    tag: String,
}

impl ImageRef {
    /// Parse `name` or `name:tag`. A missing tag means `latest`.
    pub fn parse(input: &str) -> Result<Self, ParseImageRefError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ParseImageRefError::Empty);
        }

        let (name, tag) = input.split_once(':').unwrap_or((input, "latest"));

        if let Some(c) = name
            .chars()
            .find(|c| !c.is_ascii_lowercase() && !c.is_ascii_digit() && !matches!(c, '.' | '-' | '_'))
        {
            return Err(ParseImageRefError::InvalidChar(c));
        }
        if let Some(c) = tag
            .chars()
            .find(|c| !c.is_ascii_alphanumeric() && !matches!(c, '.' | '-' | '_'))
        {
            return Err(ParseImageRefError::InvalidChar(c));
        }

        let starts_alnum = |s: &str| s.starts_with(|c: char| c.is_ascii_alphanumeric());
        if !starts_alnum(name) || tag.is_empty() || tag.len() > 128 {
            return Err(ParseImageRefError::InvalidFormat(input.to_string()));
        }

        Ok(Self {
            name: name.to_string(),
            tag: tag.to_string(),
        })
    }

    /// Deterministic tag for a deployment build:
    /// `{prefix}-{lowercased app name}:{deployment id}`.
    ///
    /// Unique per deployment, so no separate tag registry is needed.
    pub fn for_deployment(
        prefix: &str,
        app_name: &str,
        deployment: DeploymentId,
    ) -> Result<Self, ParseImageRefError> {
        let name = format!("{}-{}", prefix, app_name.to_lowercase());
        if let Some(c) = name.chars().find(|c| *c == ':') {
            return Err(ParseImageRefError::InvalidChar(c));
        }
        Self::parse(&format!("{}:{}", name, deployment))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.tag)
    }
}
