// ABOUTME: Durable record of apps and deployments, plus the global build lock.
// ABOUTME: Defines the store contract with PostgreSQL and in-memory backends.

mod error;
mod memory;
mod postgres;

pub use error::{StoreError, StoreErrorKind, StoreResult};
pub use memory::{MemoryBuildLock, MemoryStore};
pub use postgres::{BUILD_LOCK_KEY, PgBuildLock, PgStore};

use crate::model::{App, AppStatus, Deployment, DeploymentStatus, NewApp};
use crate::types::{AppId, DeploymentId};
use async_trait::async_trait;

/// Message stored when a caller fails a deployment without saying why.
const FALLBACK_ERROR_MESSAGE: &str = "deployment failed";

/// A held build lock.
///
/// Exactly one holder exists system-wide. Dropping the guard without calling
/// [`release`](BuildLock::release) still gives the lock up, so a panicking or
/// cancelled holder can never leave it behind.
#[async_trait]
pub trait BuildLock: Send {
    /// Give the lock up.
    async fn release(self) -> StoreResult<()>;
}

/// Queue, bookkeeping, and read access for deployments and their apps.
///
/// Every `update_*` call changes one logical field group and refreshes
/// `updated_at`.
#[async_trait]
pub trait DeploymentStore: Send + Sync {
    type Lock: BuildLock + 'static;

    /// Try to take the system-wide build lock without waiting.
    ///
    /// `Ok(None)` means another holder has it.
    async fn try_lock_builds(&self) -> StoreResult<Option<Self::Lock>>;

    /// Claim the oldest `pending` deployment (ties broken by id) and move it to
    /// `building`. `Ok(None)` means the queue is empty.
    ///
    /// Callers hold the build lock, but the claim itself is still atomic: a
    /// deployment that is no longer `pending` is never returned.
    async fn dequeue_next_pending(&self) -> StoreResult<Option<Deployment>>;

    /// Queue a new `pending` deployment for an app.
    async fn create_deployment(&self, app_id: AppId) -> StoreResult<Deployment>;

    /// All `pending` deployments, oldest first. Does not claim anything.
    async fn list_pending(&self) -> StoreResult<Vec<Deployment>>;

    async fn get_deployment(&self, id: DeploymentId) -> StoreResult<Deployment>;

    /// Deployments of one app, newest first.
    async fn list_deployments(&self, app_id: AppId) -> StoreResult<Vec<Deployment>>;

    /// Move a deployment forward. Rejects backwards moves and `failed`
    /// (use [`update_error`](DeploymentStore::update_error) for that).
    async fn update_status(&self, id: DeploymentId, status: DeploymentStatus) -> StoreResult<()>;

    /// Record a failure: stores the message and moves the deployment to
    /// `failed` in one step.
    async fn update_error(&self, id: DeploymentId, message: &str) -> StoreResult<()>;

    async fn update_image(&self, id: DeploymentId, image_name: &str) -> StoreResult<()>;

    /// Store the container id and subdomain together.
    async fn update_container(
        &self,
        id: DeploymentId,
        container_id: &str,
        subdomain: &str,
    ) -> StoreResult<()>;

    async fn update_build_log(&self, id: DeploymentId, build_log: &str) -> StoreResult<()>;

    /// Register an app. An empty branch is stored as `main`.
    async fn create_app(&self, app: NewApp) -> StoreResult<App>;

    async fn get_app(&self, id: AppId) -> StoreResult<App>;

    /// Set an app's status label, and its public URL when one is given.
    async fn update_app_status(
        &self,
        id: AppId,
        status: AppStatus,
        url: Option<&str>,
    ) -> StoreResult<()>;
}

/// Keeps `error_message` non-empty whenever a deployment is `failed`.
pub(crate) fn normalize_error_message(message: &str) -> &str {
    let trimmed = message.trim();
    if trimmed.is_empty() {
        FALLBACK_ERROR_MESSAGE
    } else {
        trimmed
    }
}

/// Validates a requested status change against the state machine.
pub(crate) fn check_transition(
    id: DeploymentId,
    from: DeploymentStatus,
    to: DeploymentStatus,
) -> StoreResult<()> {
    if to == DeploymentStatus::Failed {
        return Err(StoreError::MessageRequired(id));
    }
    if !from.can_transition_to(to) {
        return Err(StoreError::InvalidTransition { id, from, to });
    }
    Ok(())
}
