// ABOUTME: In-process deployment store shared by cloning.
// ABOUTME: Backs tests and single-host setups; the build lock is a guarded flag.

use super::{
    BuildLock, DeploymentStore, StoreError, StoreResult, check_transition,
    normalize_error_message,
};
use crate::model::{App, AppStatus, Deployment, DeploymentStatus, NewApp, resolve_branch};
use crate::types::{AppId, DeploymentId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Deployment store kept in memory.
///
/// Clones share the same records and the same build lock, so several engine
/// instances built from clones of one store coordinate exactly like instances
/// sharing a database.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Debug, Default)]
struct Inner {
    apps: BTreeMap<AppId, App>,
    deployments: BTreeMap<DeploymentId, Deployment>,
    next_app_id: i64,
    next_deployment_id: i64,
    build_lock_held: bool,
}

impl Inner {
    fn deployment_mut(&mut self, id: DeploymentId) -> StoreResult<&mut Deployment> {
        self.deployments
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("deployment {}", id)))
    }

    fn insert_deployment(&mut self, app_id: AppId, created_at: DateTime<Utc>) -> Deployment {
        self.next_deployment_id += 1;
        let deployment = Deployment {
            id: DeploymentId::new(self.next_deployment_id),
            app_id,
            status: DeploymentStatus::Pending,
            image_name: None,
            container_id: None,
            subdomain: None,
            build_log: None,
            error_message: None,
            created_at,
            updated_at: created_at,
        };
        self.deployments.insert(deployment.id, deployment.clone());
        deployment
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a deployment with an explicit creation time.
    ///
    /// Lets callers reproduce a queue whose insertion order differs from its
    /// creation-time order.
    pub fn create_deployment_at(
        &self,
        app_id: AppId,
        created_at: DateTime<Utc>,
    ) -> StoreResult<Deployment> {
        let mut inner = self.inner.lock();
        if !inner.apps.contains_key(&app_id) {
            return Err(StoreError::NotFound(format!("app {}", app_id)));
        }
        Ok(inner.insert_deployment(app_id, created_at))
    }

    /// Snapshot of every deployment, ordered by id.
    pub fn deployments(&self) -> Vec<Deployment> {
        self.inner.lock().deployments.values().cloned().collect()
    }

    /// Whether some holder currently owns the build lock.
    pub fn build_lock_held(&self) -> bool {
        self.inner.lock().build_lock_held
    }
}

/// Build lock handed out by [`MemoryStore`].
#[derive(Debug)]
pub struct MemoryBuildLock {
    inner: Arc<Mutex<Inner>>,
    released: bool,
}

impl MemoryBuildLock {
    fn unlock(&mut self) {
        if !self.released {
            self.inner.lock().build_lock_held = false;
            self.released = true;
        }
    }
}

impl Drop for MemoryBuildLock {
    fn drop(&mut self) {
        self.unlock();
    }
}

#[async_trait]
impl BuildLock for MemoryBuildLock {
    async fn release(mut self) -> StoreResult<()> {
        self.unlock();
        Ok(())
    }
}

#[async_trait]
impl DeploymentStore for MemoryStore {
    type Lock = MemoryBuildLock;

    async fn try_lock_builds(&self) -> StoreResult<Option<Self::Lock>> {
        let mut inner = self.inner.lock();
        if inner.build_lock_held {
            return Ok(None);
        }
        inner.build_lock_held = true;
        Ok(Some(MemoryBuildLock {
            inner: Arc::clone(&self.inner),
            released: false,
        }))
    }

    async fn dequeue_next_pending(&self) -> StoreResult<Option<Deployment>> {
        let mut inner = self.inner.lock();
        let next = inner
            .deployments
            .values()
            .filter(|d| d.status == DeploymentStatus::Pending)
            .min_by_key(|d| (d.created_at, d.id))
            .map(|d| d.id);

        let Some(id) = next else {
            return Ok(None);
        };

        let deployment = inner.deployment_mut(id)?;
        deployment.status = DeploymentStatus::Building;
        deployment.updated_at = Utc::now();
        Ok(Some(deployment.clone()))
    }

    async fn create_deployment(&self, app_id: AppId) -> StoreResult<Deployment> {
        self.create_deployment_at(app_id, Utc::now())
    }

    async fn list_pending(&self) -> StoreResult<Vec<Deployment>> {
        let inner = self.inner.lock();
        let mut pending: Vec<Deployment> = inner
            .deployments
            .values()
            .filter(|d| d.status == DeploymentStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by_key(|d| (d.created_at, d.id));
        Ok(pending)
    }

    async fn get_deployment(&self, id: DeploymentId) -> StoreResult<Deployment> {
        self.inner
            .lock()
            .deployments
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("deployment {}", id)))
    }

    async fn list_deployments(&self, app_id: AppId) -> StoreResult<Vec<Deployment>> {
        let inner = self.inner.lock();
        let mut deployments: Vec<Deployment> = inner
            .deployments
            .values()
            .filter(|d| d.app_id == app_id)
            .cloned()
            .collect();
        deployments.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(deployments)
    }

    async fn update_status(&self, id: DeploymentId, status: DeploymentStatus) -> StoreResult<()> {
        let mut inner = self.inner.lock();
        let deployment = inner.deployment_mut(id)?;
        check_transition(id, deployment.status, status)?;
        deployment.status = status;
        deployment.updated_at = Utc::now();
        Ok(())
    }

    async fn update_error(&self, id: DeploymentId, message: &str) -> StoreResult<()> {
        let mut inner = self.inner.lock();
        let deployment = inner.deployment_mut(id)?;
        if !deployment.status.can_transition_to(DeploymentStatus::Failed) {
            return Err(StoreError::InvalidTransition {
                id,
                from: deployment.status,
                to: DeploymentStatus::Failed,
            });
        }
        deployment.status = DeploymentStatus::Failed;
        deployment.error_message = Some(normalize_error_message(message).to_string());
        deployment.updated_at = Utc::now();
        Ok(())
    }

    async fn update_image(&self, id: DeploymentId, image_name: &str) -> StoreResult<()> {
        let mut inner = self.inner.lock();
        let deployment = inner.deployment_mut(id)?;
        deployment.image_name = Some(image_name.to_string());
        deployment.updated_at = Utc::now();
        Ok(())
    }

    async fn update_container(
        &self,
        id: DeploymentId,
        container_id: &str,
        subdomain: &str,
    ) -> StoreResult<()> {
        let mut inner = self.inner.lock();
        let deployment = inner.deployment_mut(id)?;
        deployment.container_id = Some(container_id.to_string());
        deployment.subdomain = Some(subdomain.to_string());
        deployment.updated_at = Utc::now();
        Ok(())
    }

    async fn update_build_log(&self, id: DeploymentId, build_log: &str) -> StoreResult<()> {
        let mut inner = self.inner.lock();
        let deployment = inner.deployment_mut(id)?;
        deployment.build_log = Some(build_log.to_string());
        deployment.updated_at = Utc::now();
        Ok(())
    }

    async fn create_app(&self, app: NewApp) -> StoreResult<App> {
        let mut inner = self.inner.lock();
        inner.next_app_id += 1;
        let now = Utc::now();
        let app = App {
            id: AppId::new(inner.next_app_id),
            user_id: app.user_id,
            name: app.name,
            branch: resolve_branch(&app.branch).to_string(),
            repo_url: app.repo_url,
            url: None,
            status: String::new(),
            created_at: now,
            updated_at: now,
        };
        inner.apps.insert(app.id, app.clone());
        Ok(app)
    }

    async fn get_app(&self, id: AppId) -> StoreResult<App> {
        self.inner
            .lock()
            .apps
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("app {}", id)))
    }

    async fn update_app_status(
        &self,
        id: AppId,
        status: AppStatus,
        url: Option<&str>,
    ) -> StoreResult<()> {
        let mut inner = self.inner.lock();
        let app = inner
            .apps
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("app {}", id)))?;
        app.status = status.to_string();
        if let Some(url) = url {
            app.url = Some(url.to_string());
        }
        app.updated_at = Utc::now();
        Ok(())
    }
}
