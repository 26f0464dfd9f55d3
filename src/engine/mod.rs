// ABOUTME: Deployment engine: the locked polling loop and per-deployment supervision.
// ABOUTME: Claims one deployment at a time under the global build lock and never lets a failure escape.

mod error;
mod identity;
mod pipeline;
mod report;

pub use error::{EngineError, EngineErrorKind};
pub use identity::WorkerIdentity;
pub use report::{Outcome, ProcessReport, Stage};

use crate::diagnostics::{Diagnostics, Warning};
use crate::fetch::SourceFetcher;
use crate::launch::LaunchSettings;
use crate::model::AppStatus;
use crate::runtime::{ContainerOps, ImageOps};
use crate::store::{BuildLock, DeploymentStore};
use crate::types::{AppId, DeploymentId};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{Instrument, debug, error, info, warn};

/// Prefix on messages recorded for failures that are not a step's fault.
pub const INTERNAL_ERROR_PREFIX: &str = "internal error";

/// Settings for one engine instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Domain deployments are served under.
    pub base_domain: String,
    /// First part of every built image's name.
    pub image_prefix: String,
    /// Wait after finding the queue empty.
    pub poll_interval: Duration,
    /// Wait after finding the build lock taken.
    pub lock_retry_interval: Duration,
    pub launch: LaunchSettings,
}

impl EngineConfig {
    /// Defaults for everything except the base domain.
    pub fn new(base_domain: impl Into<String>) -> Self {
        Self {
            base_domain: base_domain.into(),
            image_prefix: "dockyard".to_string(),
            poll_interval: Duration::from_secs(5),
            lock_retry_interval: Duration::from_secs(2),
            launch: LaunchSettings::default(),
        }
    }
}

/// Turns queued deployments into running containers.
///
/// Several engines may run against one store; the store's build lock lets
/// exactly one of them process a deployment at any instant.
pub struct Engine<S, R, F> {
    store: S,
    runtime: R,
    fetcher: F,
    config: EngineConfig,
    identity: WorkerIdentity,
}

impl<S, R, F> Engine<S, R, F>
where
    S: DeploymentStore,
    R: ImageOps + ContainerOps,
    F: SourceFetcher,
{
    pub fn new(store: S, runtime: R, fetcher: F, config: EngineConfig) -> Self {
        Self {
            store,
            runtime,
            fetcher,
            config,
            identity: WorkerIdentity::current(),
        }
    }

    /// Replace the identity logged when this engine takes the lock.
    pub fn with_identity(mut self, identity: WorkerIdentity) -> Self {
        self.identity = identity;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn identity(&self) -> &WorkerIdentity {
        &self.identity
    }

    /// Run until `shutdown` turns true or its sender is dropped.
    ///
    /// Shutdown is observed between iterations and during waits; a
    /// deployment already in flight is finished first.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(worker = %self.identity, "engine started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            let wait = match self.process_next().await {
                Ok(report) => match report.outcome {
                    Outcome::LockBusy => self.config.lock_retry_interval,
                    Outcome::Idle => self.config.poll_interval,
                    _ => Duration::ZERO,
                },
                Err(e) => {
                    warn!(error = %e, "engine iteration failed, backing off");
                    self.config.poll_interval
                }
            };

            if wait.is_zero() {
                continue;
            }

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!(worker = %self.identity, "engine stopped");
    }

    /// Take the build lock, process at most one deployment, release the lock.
    ///
    /// `Err` is returned only when no deployment was claimed. Once one is
    /// claimed, every failure ends up recorded on it and in the report.
    pub async fn process_next(&self) -> Result<ProcessReport, EngineError> {
        let Some(lock) = self.store.try_lock_builds().await.map_err(EngineError::Lock)? else {
            debug!("build lock held by another worker");
            return Ok(ProcessReport::new(Outcome::LockBusy, Vec::new()));
        };
        debug!(worker = %self.identity, "build lock acquired");

        let mut diagnostics = Diagnostics::default();
        let result = self.process_locked(&mut diagnostics).await;

        if let Err(e) = lock.release().await {
            diagnostics.warn(Warning::lock_release(format!(
                "failed to release build lock: {}",
                e
            )));
        }

        result.map(|outcome| ProcessReport::new(outcome, diagnostics.into_warnings()))
    }

    async fn process_locked(&self, diag: &mut Diagnostics) -> Result<Outcome, EngineError> {
        let Some(deployment) = self
            .store
            .dequeue_next_pending()
            .await
            .map_err(EngineError::Dequeue)?
        else {
            debug!("no pending deployments");
            return Ok(Outcome::Idle);
        };

        let span = tracing::info_span!(
            "deployment",
            deployment_id = %deployment.id,
            app_id = %deployment.app_id,
        );
        Ok(self
            .supervise(deployment.id, deployment.app_id, diag)
            .instrument(span)
            .await)
    }

    /// Run the pipeline for a claimed deployment, containing every failure.
    async fn supervise(
        &self,
        deployment_id: DeploymentId,
        app_id: AppId,
        diag: &mut Diagnostics,
    ) -> Outcome {
        info!("processing deployment");

        let result = AssertUnwindSafe(self.run_pipeline(deployment_id, &mut *diag))
            .catch_unwind()
            .await;

        match result {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                error!(error = %e, "deployment aborted");
                let message = format!("{}: {}", INTERNAL_ERROR_PREFIX, e);
                self.record_internal_failure(deployment_id, app_id, &message, diag)
                    .await;
                Outcome::Aborted {
                    deployment_id,
                    message,
                }
            }
            Err(payload) => {
                let message = format!(
                    "{}: deployment processing panicked: {}",
                    INTERNAL_ERROR_PREFIX,
                    panic_message(payload.as_ref())
                );
                error!("{}", message);
                self.record_internal_failure(deployment_id, app_id, &message, diag)
                    .await;
                Outcome::Panicked {
                    deployment_id,
                    message,
                }
            }
        }
    }

    /// Best-effort: mark the deployment and its app failed after an abort.
    async fn record_internal_failure(
        &self,
        deployment_id: DeploymentId,
        app_id: AppId,
        message: &str,
        diag: &mut Diagnostics,
    ) {
        if let Err(e) = self.store.update_error(deployment_id, message).await {
            diag.warn(Warning::failure_record(format!(
                "failed to record failure on deployment {}: {}",
                deployment_id, e
            )));
        }
        self.mark_app(app_id, AppStatus::Failed, None, diag).await;
    }

    /// Best-effort app status update.
    async fn mark_app(
        &self,
        app_id: AppId,
        status: AppStatus,
        url: Option<&str>,
        diag: &mut Diagnostics,
    ) {
        if let Err(e) = self.store.update_app_status(app_id, status, url).await {
            diag.warn(Warning::app_status(format!(
                "failed to mark app {} {}: {}",
                app_id, status, e
            )));
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_payloads_become_text() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");

        let payload: Box<dyn Any + Send> = Box::new(String::from("owned boom"));
        assert_eq!(panic_message(payload.as_ref()), "owned boom");

        let payload: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic payload");
    }

    #[test]
    fn engine_config_defaults() {
        let config = EngineConfig::new("apps.example.com");
        assert_eq!(config.image_prefix, "dockyard");
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.lock_retry_interval, Duration::from_secs(2));
    }
}
