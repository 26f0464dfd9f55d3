// ABOUTME: Identity of an engine instance, logged whenever it takes the build lock.
// ABOUTME: Hostname plus process id, so operators can tell competing workers apart.

use chrono::{DateTime, Utc};
use std::fmt;

/// Who an engine instance is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerIdentity {
    /// Hostname of the machine running the engine.
    pub hostname: String,
    /// Process ID of the engine.
    pub pid: u32,
    /// Distinguishes engines sharing one process.
    pub instance: Option<String>,
    /// When the engine was created.
    pub started_at: DateTime<Utc>,
}

impl WorkerIdentity {
    /// Identity of the current process.
    pub fn current() -> Self {
        Self {
            hostname: gethostname::gethostname().to_string_lossy().into_owned(),
            pid: std::process::id(),
            instance: None,
            started_at: Utc::now(),
        }
    }

    /// Tag this identity with an instance name.
    pub fn with_instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = Some(instance.into());
        self
    }
}

impl fmt::Display for WorkerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.hostname, self.pid)?;
        if let Some(instance) = &self.instance {
            write!(f, "/{}", instance)?;
        }
        Ok(())
    }
}
