// ABOUTME: DNS-compatible subdomain label assigned to each deployment.
// ABOUTME: Derived deterministically from the app name and deployment id.

use super::id::DeploymentId;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubdomainError {
    #[error("subdomain cannot be empty")]
    Empty,

    #[error("subdomain exceeds maximum length of 63 characters")]
    TooLong,

    #[error("subdomain cannot start with a hyphen")]
    StartsWithHyphen,

    #[error("subdomain cannot end with a hyphen")]
    EndsWithHyphen,

    #[error("subdomain must be lowercase")]
    NotLowercase,

    #[error("invalid character in subdomain: '{0}'")]
    InvalidChar(char),
}

/// A single RFC 1123 label, e.g. `blog-42`.
///
/// Also used as the container name and the reverse-proxy router name, so the
/// same validation covers all three.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Subdomain(String);

impl Subdomain {
    pub fn new(value: &str) -> Result<Self, SubdomainError> {
        if value.is_empty() {
            return Err(SubdomainError::Empty);
        }

        if value.len() > 63 {
            return Err(SubdomainError::TooLong);
        }

        if value.starts_with('-') {
            return Err(SubdomainError::StartsWithHyphen);
        }

        if value.ends_with('-') {
            return Err(SubdomainError::EndsWithHyphen);
        }

        for c in value.chars() {
            if c.is_ascii_uppercase() {
                return Err(SubdomainError::NotLowercase);
            }
            if !c.is_ascii_lowercase() && !c.is_ascii_digit() && c != '-' {
                return Err(SubdomainError::InvalidChar(c));
            }
        }

        Ok(Self(value.to_string()))
    }

    /// `{lowercased app name}-{deployment id}`.
    pub fn for_deployment(app_name: &str, deployment: DeploymentId) -> Result<Self, SubdomainError> {
        Self::new(&format!("{}-{}", app_name.to_lowercase(), deployment))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Fully qualified host name under the platform's base domain.
    pub fn host(&self, base_domain: &str) -> String {
        format!("{}.{}", self.0, base_domain)
    }

    /// Public URL the app is served on once the deployment is live.
    pub fn public_url(&self, base_domain: &str) -> String {
        format!("https://{}", self.host(base_domain))
    }
}

impl fmt::Display for Subdomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
