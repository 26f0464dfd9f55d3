// ABOUTME: Scriptable stand-ins for the container runtime, source fetcher, and store.
// ABOUTME: Each fake records what the engine asked of it for later assertions.

use async_trait::async_trait;
use dockyard::fetch::{Checkout, FetchError, SourceFetcher};
use dockyard::model::{App, AppStatus, Deployment, DeploymentStatus, NewApp};
use dockyard::runtime::{
    BuildEvent, BuildStream, ContainerConfig, ContainerError, ContainerInfo, ContainerOps,
    ContainerState, ImageError, ImageOps,
};
use dockyard::store::{BuildLock, DeploymentStore, MemoryBuildLock, MemoryStore, StoreError, StoreResult};
use dockyard::types::{AppId, ContainerId, DeploymentId, ImageRef};
use futures::StreamExt;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

// =============================================================================
// Runtime
// =============================================================================

/// How the next image builds should end.
#[derive(Debug, Clone, Default)]
pub enum BuildScript {
    #[default]
    Succeed,
    /// A build step reports this error.
    FailStep(String),
    /// The output stream breaks off; the image exists afterwards only if set.
    BreakStream { image_created: bool },
}

#[derive(Debug, Default)]
struct RuntimeState {
    build: BuildScript,
    create_failure: Option<String>,
    start_failure: Option<String>,
    images: HashSet<String>,
    created: Vec<ContainerConfig>,
    started: Vec<ContainerId>,
    stopped: Vec<ContainerId>,
    removed: Vec<ContainerId>,
}

/// Container runtime that keeps everything in memory.
#[derive(Debug, Clone, Default)]
pub struct FakeRuntime {
    state: Arc<Mutex<RuntimeState>>,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script_build(&self, script: BuildScript) {
        self.state.lock().build = script;
    }

    pub fn fail_create(&self, message: &str) {
        self.state.lock().create_failure = Some(message.to_string());
    }

    pub fn fail_start(&self, message: &str) {
        self.state.lock().start_failure = Some(message.to_string());
    }

    pub fn images(&self) -> HashSet<String> {
        self.state.lock().images.clone()
    }

    pub fn created(&self) -> Vec<ContainerConfig> {
        self.state.lock().created.clone()
    }

    pub fn started(&self) -> Vec<ContainerId> {
        self.state.lock().started.clone()
    }

    pub fn stopped(&self) -> Vec<ContainerId> {
        self.state.lock().stopped.clone()
    }

    pub fn removed(&self) -> Vec<ContainerId> {
        self.state.lock().removed.clone()
    }
}

#[async_trait]
impl ImageOps for FakeRuntime {
    async fn build_image<'a>(
        &'a self,
        context: Vec<u8>,
        tag: &ImageRef,
    ) -> Result<BuildStream<'a>, ImageError> {
        if context.is_empty() {
            return Err(ImageError::Runtime("empty build context".to_string()));
        }

        let mut state = self.state.lock();
        let mut events = vec![
            Ok(BuildEvent::Output("Step 1/2 : FROM scratch\n".to_string())),
            Ok(BuildEvent::Output("Step 2/2 : COPY . /app\n".to_string())),
        ];
        match state.build.clone() {
            BuildScript::Succeed => {
                events.push(Ok(BuildEvent::Output(format!("Successfully tagged {}\n", tag))));
                state.images.insert(tag.to_string());
            }
            BuildScript::FailStep(message) => events.push(Ok(BuildEvent::Failed(message))),
            BuildScript::BreakStream { image_created } => {
                events.push(Err(ImageError::Runtime("connection reset by peer".to_string())));
                if image_created {
                    state.images.insert(tag.to_string());
                }
            }
        }

        Ok(futures::stream::iter(events).boxed())
    }

    async fn image_exists(&self, reference: &ImageRef) -> Result<bool, ImageError> {
        Ok(self.state.lock().images.contains(&reference.to_string()))
    }
}

#[async_trait]
impl ContainerOps for FakeRuntime {
    async fn create_container(
        &self,
        config: &ContainerConfig,
    ) -> Result<ContainerId, ContainerError> {
        let mut state = self.state.lock();
        if let Some(message) = &state.create_failure {
            return Err(ContainerError::Runtime(message.clone()));
        }
        if !state.images.contains(&config.image.to_string()) {
            return Err(ContainerError::ImageNotFound(config.image.to_string()));
        }
        if state.created.iter().any(|c| c.name == config.name) {
            return Err(ContainerError::AlreadyExists(config.name.clone()));
        }
        state.created.push(config.clone());
        Ok(ContainerId::new(format!("container-{}", state.created.len())))
    }

    async fn start_container(&self, id: &ContainerId) -> Result<(), ContainerError> {
        let mut state = self.state.lock();
        if let Some(message) = &state.start_failure {
            return Err(ContainerError::Runtime(message.clone()));
        }
        state.started.push(id.clone());
        Ok(())
    }

    async fn stop_container(
        &self,
        id: &ContainerId,
        _timeout: Duration,
    ) -> Result<(), ContainerError> {
        let mut state = self.state.lock();
        match state.started.iter().position(|s| s == id) {
            Some(pos) => {
                state.started.remove(pos);
                state.stopped.push(id.clone());
                Ok(())
            }
            None => Err(ContainerError::NotRunning(id.to_string())),
        }
    }

    async fn remove_container(&self, id: &ContainerId, _force: bool) -> Result<(), ContainerError> {
        let mut state = self.state.lock();
        if state.removed.contains(id) {
            return Err(ContainerError::NotFound(id.to_string()));
        }
        state.started.retain(|s| s != id);
        state.removed.push(id.clone());
        Ok(())
    }

    async fn inspect_container(&self, id: &ContainerId) -> Result<ContainerInfo, ContainerError> {
        let state = self.state.lock();
        let index = id
            .as_str()
            .strip_prefix("container-")
            .and_then(|n| n.parse::<usize>().ok())
            .filter(|n| *n >= 1 && *n <= state.created.len())
            .filter(|_| !state.removed.contains(id))
            .ok_or_else(|| ContainerError::NotFound(id.to_string()))?;
        let config = &state.created[index - 1];
        Ok(ContainerInfo {
            id: id.clone(),
            state: if state.started.contains(id) {
                ContainerState::Running
            } else {
                ContainerState::Created
            },
            labels: config.labels.clone(),
        })
    }
}

// =============================================================================
// Fetcher
// =============================================================================

/// What every fetch produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchScript {
    WithDockerfile,
    WithoutDockerfile,
    Unreachable,
    Panic,
}

#[derive(Debug, Default)]
struct FetchLog {
    calls: Vec<(DeploymentId, String, String)>,
    paths: Vec<PathBuf>,
}

/// Fetcher that materializes a tiny repository in a temp dir.
#[derive(Debug, Clone)]
pub struct FakeFetcher {
    script: FetchScript,
    log: Arc<Mutex<FetchLog>>,
    active: Arc<AtomicUsize>,
    max_active: Arc<AtomicUsize>,
}

impl FakeFetcher {
    pub fn new(script: FetchScript) -> Self {
        Self {
            script,
            log: Arc::default(),
            active: Arc::default(),
            max_active: Arc::default(),
        }
    }

    /// `(deployment, repo_url, branch)` for every fetch, in call order.
    pub fn calls(&self) -> Vec<(DeploymentId, String, String)> {
        self.log.lock().calls.clone()
    }

    /// Checkout directories handed out so far.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.log.lock().paths.clone()
    }

    /// Highest number of fetches that were ever in flight at once.
    pub fn max_concurrent(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceFetcher for FakeFetcher {
    async fn fetch(
        &self,
        repo_url: &str,
        deployment_id: DeploymentId,
        branch: &str,
    ) -> Result<Checkout, FetchError> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        self.log
            .lock()
            .calls
            .push((deployment_id, repo_url.to_string(), branch.to_string()));

        // Give a concurrently running engine the chance to interleave.
        tokio::task::yield_now().await;
        let result = self.materialize(repo_url);

        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

impl FakeFetcher {
    fn materialize(&self, repo_url: &str) -> Result<Checkout, FetchError> {
        match self.script {
            FetchScript::Unreachable => Err(FetchError::Unreachable {
                url: repo_url.to_string(),
                message: "Could not resolve host: git.example.com".to_string(),
            }),
            FetchScript::Panic => panic!("fetcher exploded"),
            FetchScript::WithDockerfile | FetchScript::WithoutDockerfile => {
                let dir = tempfile::tempdir().map_err(|source| FetchError::Filesystem {
                    path: std::env::temp_dir(),
                    source,
                })?;
                let write = |name: &str, body: &str| {
                    std::fs::write(dir.path().join(name), body).map_err(|source| {
                        FetchError::Filesystem {
                            path: dir.path().to_path_buf(),
                            source,
                        }
                    })
                };
                write("index.html", "<h1>hello</h1>\n")?;
                if self.script == FetchScript::WithDockerfile {
                    write("Dockerfile", "FROM scratch\nCOPY . /app\n")?;
                }
                self.log.lock().paths.push(dir.path().to_path_buf());
                Ok(Checkout::temporary(dir))
            }
        }
    }
}

// =============================================================================
// Store
// =============================================================================

/// Store calls that [`FlakyStore`] can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    GetApp,
    UpdateStatus,
    UpdateError,
    UpdateImage,
    UpdateContainer,
    UpdateBuildLog,
    UpdateAppStatus,
    ReleaseLock,
}

/// Memory store whose chosen operations fail as if the database went away.
#[derive(Debug, Clone, Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    failing: Arc<Mutex<HashSet<StoreOp>>>,
}

impl FlakyStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            failing: Arc::default(),
        }
    }

    pub fn fail(&self, op: StoreOp) {
        self.failing.lock().insert(op);
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    fn check(&self, op: StoreOp) -> StoreResult<()> {
        if self.failing.lock().contains(&op) {
            Err(StoreError::Connection(format!("injected {:?} failure", op)))
        } else {
            Ok(())
        }
    }
}

/// Lock from a [`FlakyStore`]; its release can be made to fail.
#[derive(Debug)]
pub struct FlakyLock {
    inner: MemoryBuildLock,
    fail_release: bool,
}

#[async_trait]
impl BuildLock for FlakyLock {
    async fn release(self) -> StoreResult<()> {
        let fail = self.fail_release;
        self.inner.release().await?;
        if fail {
            return Err(StoreError::Connection("injected release failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl DeploymentStore for FlakyStore {
    type Lock = FlakyLock;

    async fn try_lock_builds(&self) -> StoreResult<Option<Self::Lock>> {
        let fail_release = self.check(StoreOp::ReleaseLock).is_err();
        Ok(self
            .inner
            .try_lock_builds()
            .await?
            .map(|inner| FlakyLock {
                inner,
                fail_release,
            }))
    }

    async fn dequeue_next_pending(&self) -> StoreResult<Option<Deployment>> {
        self.inner.dequeue_next_pending().await
    }

    async fn create_deployment(&self, app_id: AppId) -> StoreResult<Deployment> {
        self.inner.create_deployment(app_id).await
    }

    async fn list_pending(&self) -> StoreResult<Vec<Deployment>> {
        self.inner.list_pending().await
    }

    async fn get_deployment(&self, id: DeploymentId) -> StoreResult<Deployment> {
        self.inner.get_deployment(id).await
    }

    async fn list_deployments(&self, app_id: AppId) -> StoreResult<Vec<Deployment>> {
        self.inner.list_deployments(app_id).await
    }

    async fn update_status(&self, id: DeploymentId, status: DeploymentStatus) -> StoreResult<()> {
        self.check(StoreOp::UpdateStatus)?;
        self.inner.update_status(id, status).await
    }

    async fn update_error(&self, id: DeploymentId, message: &str) -> StoreResult<()> {
        self.check(StoreOp::UpdateError)?;
        self.inner.update_error(id, message).await
    }

    async fn update_image(&self, id: DeploymentId, image_name: &str) -> StoreResult<()> {
        self.check(StoreOp::UpdateImage)?;
        self.inner.update_image(id, image_name).await
    }

    async fn update_container(
        &self,
        id: DeploymentId,
        container_id: &str,
        subdomain: &str,
    ) -> StoreResult<()> {
        self.check(StoreOp::UpdateContainer)?;
        self.inner.update_container(id, container_id, subdomain).await
    }

    async fn update_build_log(&self, id: DeploymentId, build_log: &str) -> StoreResult<()> {
        self.check(StoreOp::UpdateBuildLog)?;
        self.inner.update_build_log(id, build_log).await
    }

    async fn create_app(&self, app: NewApp) -> StoreResult<App> {
        self.inner.create_app(app).await
    }

    async fn get_app(&self, id: AppId) -> StoreResult<App> {
        self.check(StoreOp::GetApp)?;
        self.inner.get_app(id).await
    }

    async fn update_app_status(
        &self,
        id: AppId,
        status: AppStatus,
        url: Option<&str>,
    ) -> StoreResult<()> {
        self.check(StoreOp::UpdateAppStatus)?;
        self.inner.update_app_status(id, status, url).await
    }
}
