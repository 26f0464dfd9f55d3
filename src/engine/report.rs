// ABOUTME: Results of one engine iteration.
// ABOUTME: Says what happened to the claimed deployment and lists every swallowed failure.

use crate::diagnostics::{Warning, WarningKind};
use crate::types::DeploymentId;
use std::fmt;

/// Pipeline step a deployment failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    BuildDescriptor,
    Build,
    Launch,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Fetch => "fetch",
            Stage::BuildDescriptor => "build-descriptor",
            Stage::Build => "build",
            Stage::Launch => "launch",
        };
        f.write_str(name)
    }
}

/// What one engine iteration did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Another instance holds the build lock.
    LockBusy,
    /// The lock was taken but nothing was pending.
    Idle,
    /// The deployment is live at `url`.
    Running { deployment_id: DeploymentId, url: String },
    /// A pipeline step failed; the failure is recorded on the deployment.
    Failed {
        deployment_id: DeploymentId,
        stage: Stage,
        message: String,
    },
    /// Bookkeeping failed after a step succeeded.
    Aborted {
        deployment_id: DeploymentId,
        message: String,
    },
    /// Processing panicked and was contained.
    Panicked {
        deployment_id: DeploymentId,
        message: String,
    },
}

impl Outcome {
    /// The deployment this iteration worked on, if it claimed one.
    pub fn deployment_id(&self) -> Option<DeploymentId> {
        match self {
            Outcome::LockBusy | Outcome::Idle => None,
            Outcome::Running { deployment_id, .. }
            | Outcome::Failed { deployment_id, .. }
            | Outcome::Aborted { deployment_id, .. }
            | Outcome::Panicked { deployment_id, .. } => Some(*deployment_id),
        }
    }
}

/// An iteration's outcome plus the best-effort failures it tolerated.
#[derive(Debug, Clone)]
pub struct ProcessReport {
    pub outcome: Outcome,
    pub warnings: Vec<Warning>,
}

impl ProcessReport {
    pub fn new(outcome: Outcome, warnings: Vec<Warning>) -> Self {
        Self { outcome, warnings }
    }

    /// Whether a warning of the given kind was tolerated.
    pub fn has_warning(&self, kind: WarningKind) -> bool {
        self.warnings.iter().any(|w| w.kind == kind)
    }
}
