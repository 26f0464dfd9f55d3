// ABOUTME: Persisted records for apps and deployments plus their status labels.
// ABOUTME: Status values are free text in storage and validated here in code.

use crate::types::{AppId, DeploymentId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Branch used when an app does not name one.
pub const DEFAULT_BRANCH: &str = "main";

/// Lifecycle of a single deployment record.
///
/// `Pending -> Building -> Running` on success, `Building -> Failed` when any
/// step after dequeue fails. `Running` and `Failed` are terminal; a retry is a
/// new record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentStatus {
    Pending,
    Building,
    Running,
    Failed,
}

impl DeploymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentStatus::Pending => "pending",
            DeploymentStatus::Building => "building",
            DeploymentStatus::Running => "running",
            DeploymentStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, DeploymentStatus::Running | DeploymentStatus::Failed)
    }

    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(&self, next: DeploymentStatus) -> bool {
        matches!(
            (self, next),
            (DeploymentStatus::Pending, DeploymentStatus::Building)
                | (DeploymentStatus::Building, DeploymentStatus::Running)
                | (DeploymentStatus::Building, DeploymentStatus::Failed)
        )
    }

    /// States from which `next` may be entered.
    pub fn predecessors(next: DeploymentStatus) -> &'static [DeploymentStatus] {
        match next {
            DeploymentStatus::Pending => &[],
            DeploymentStatus::Building => &[DeploymentStatus::Pending],
            DeploymentStatus::Running | DeploymentStatus::Failed => &[DeploymentStatus::Building],
        }
    }
}

impl fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown deployment status: {0:?}")]
pub struct UnknownStatus(pub String);

impl FromStr for DeploymentStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(DeploymentStatus::Pending),
            "building" => Ok(DeploymentStatus::Building),
            "running" => Ok(DeploymentStatus::Running),
            "failed" => Ok(DeploymentStatus::Failed),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Labels the engine writes to an app's status column.
///
/// The column itself is free text; other writers may use other labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppStatus {
    Building,
    Healthy,
    Failed,
}

impl AppStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppStatus::Building => "Building",
            AppStatus::Healthy => "Healthy",
            AppStatus::Failed => "Failed",
        }
    }
}

impl fmt::Display for AppStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A deployable unit tied to a Git repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct App {
    pub id: AppId,
    pub user_id: i64,
    pub name: String,
    pub repo_url: String,
    pub branch: String,
    pub url: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl App {
    /// Branch to check out, falling back to `main` when unset.
    pub fn effective_branch(&self) -> &str {
        resolve_branch(&self.branch)
    }
}

pub fn resolve_branch(branch: &str) -> &str {
    let trimmed = branch.trim();
    if trimmed.is_empty() {
        DEFAULT_BRANCH
    } else {
        trimmed
    }
}

/// Fields supplied when an app is registered.
#[derive(Debug, Clone, Default)]
pub struct NewApp {
    pub user_id: i64,
    pub name: String,
    pub repo_url: String,
    pub branch: String,
}

/// One build-and-run attempt for an app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    pub id: DeploymentId,
    pub app_id: AppId,
    pub status: DeploymentStatus,
    pub image_name: Option<String>,
    pub container_id: Option<String>,
    pub subdomain: Option<String>,
    pub build_log: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
