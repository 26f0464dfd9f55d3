// ABOUTME: Diagnostics accumulator for non-fatal warnings during a deployment.
// ABOUTME: Every best-effort failure the engine swallows is recorded here with a kind.

/// Collects non-fatal warnings while a deployment is processed.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    /// Record a warning, auto-logging it via tracing.
    pub fn warn(&mut self, warning: Warning) {
        tracing::warn!(kind = ?warning.kind, "{}", warning.message);
        self.warnings.push(warning);
    }

    /// Get all collected warnings.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Check if any warnings were collected.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Whether a warning of the given kind was recorded.
    pub fn contains(&self, kind: WarningKind) -> bool {
        self.warnings.iter().any(|w| w.kind == kind)
    }

    pub fn into_warnings(self) -> Vec<Warning> {
        self.warnings
    }
}

/// A non-fatal warning collected during a deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl Warning {
    pub fn new(kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Create an app status update warning.
    pub fn app_status(message: impl Into<String>) -> Self {
        Self::new(WarningKind::AppStatusUpdate, message)
    }

    /// Create a build log read warning.
    pub fn build_log_read(message: impl Into<String>) -> Self {
        Self::new(WarningKind::BuildLogRead, message)
    }

    /// Create a build log persist warning.
    pub fn build_log_persist(message: impl Into<String>) -> Self {
        Self::new(WarningKind::BuildLogPersist, message)
    }

    /// Create a lock release warning.
    pub fn lock_release(message: impl Into<String>) -> Self {
        Self::new(WarningKind::LockRelease, message)
    }

    /// Create a failure record warning.
    pub fn failure_record(message: impl Into<String>) -> Self {
        Self::new(WarningKind::FailureRecord, message)
    }
}

/// Categories of warnings that can occur during a deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WarningKind {
    /// Failed to update the owning app's status or URL.
    AppStatusUpdate,
    /// The build output stream could not be read to the end.
    BuildLogRead,
    /// The collected build log could not be stored.
    BuildLogPersist,
    /// Failed to release the build lock cleanly (the guard still drops it).
    LockRelease,
    /// Failed to record a deployment failure on the deployment itself.
    FailureRecord,
}
