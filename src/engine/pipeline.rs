// ABOUTME: The per-deployment pipeline: fetch, check, build, launch, record.
// ABOUTME: Step failures are recorded on the deployment; bookkeeping failures are returned.

use super::{Engine, EngineError, Outcome, Stage};
use crate::build::build_image;
use crate::diagnostics::{Diagnostics, Warning};
use crate::fetch::{SourceFetcher, ensure_build_descriptor};
use crate::launch::launch;
use crate::model::{AppStatus, Deployment, DeploymentStatus};
use crate::runtime::{ContainerOps, ImageOps};
use crate::store::DeploymentStore;
use crate::types::{DeploymentId, ImageRef, Subdomain};
use tracing::{error, info};

impl<S, R, F> Engine<S, R, F>
where
    S: DeploymentStore,
    R: ImageOps + ContainerOps,
    F: SourceFetcher,
{
    pub(super) async fn run_pipeline(
        &self,
        id: DeploymentId,
        diag: &mut Diagnostics,
    ) -> Result<Outcome, EngineError> {
        let deployment = self
            .store
            .get_deployment(id)
            .await
            .map_err(|source| EngineError::LoadDeployment { id, source })?;
        let app = self
            .store
            .get_app(deployment.app_id)
            .await
            .map_err(|source| EngineError::LoadApp {
                id: deployment.app_id,
                source,
            })?;

        self.mark_app(app.id, AppStatus::Building, None, diag).await;

        let branch = app.effective_branch();
        info!(repo = %app.repo_url, branch, "fetching source");
        let checkout = match self.fetcher.fetch(&app.repo_url, id, branch).await {
            Ok(checkout) => checkout,
            Err(e) => return self.fail(&deployment, Stage::Fetch, e.to_string(), diag).await,
        };

        if let Err(e) = ensure_build_descriptor(&checkout) {
            return self
                .fail(&deployment, Stage::BuildDescriptor, e.to_string(), diag)
                .await;
        }

        let tag = match ImageRef::for_deployment(&self.config.image_prefix, &app.name, id) {
            Ok(tag) => tag,
            Err(e) => {
                let message = format!("cannot derive image name from app name {:?}: {}", app.name, e);
                return self.fail(&deployment, Stage::Build, message, diag).await;
            }
        };

        // Both names are derived before anything is built.
        let subdomain = match Subdomain::for_deployment(&app.name, id) {
            Ok(subdomain) => subdomain,
            Err(e) => {
                let message = format!("cannot derive subdomain from app name {:?}: {}", app.name, e);
                return self.fail(&deployment, Stage::Launch, message, diag).await;
            }
        };

        info!(image = %tag, "building image");
        let built = match build_image(&self.runtime, checkout.path(), &tag).await {
            Ok(built) => built,
            Err(e) => {
                if let Some(log) = e.log() {
                    self.persist_build_log(id, log, diag).await;
                }
                return self.fail(&deployment, Stage::Build, e.to_string(), diag).await;
            }
        };
        drop(checkout);

        if let Some(read_error) = &built.log_read_error {
            diag.warn(Warning::build_log_read(format!(
                "build log for deployment {} is incomplete: {}",
                id, read_error
            )));
        }
        self.persist_build_log(id, &built.log, diag).await;
        self.store
            .update_image(id, &built.image.to_string())
            .await
            .map_err(|source| EngineError::Persist {
                id,
                field: "image_name",
                source,
            })?;

        let container_id = match launch(
            &self.runtime,
            &built.image,
            &subdomain,
            id,
            &self.config.base_domain,
            &self.config.launch,
        )
        .await
        {
            Ok(container_id) => container_id,
            Err(e) => return self.fail(&deployment, Stage::Launch, e.to_string(), diag).await,
        };

        self.store
            .update_container(id, container_id.as_str(), subdomain.as_str())
            .await
            .map_err(|source| EngineError::Persist {
                id,
                field: "container_id",
                source,
            })?;

        self.store
            .update_status(id, DeploymentStatus::Running)
            .await
            .map_err(|source| EngineError::Persist {
                id,
                field: "status",
                source,
            })?;

        let url = subdomain.public_url(&self.config.base_domain);
        self.mark_app(app.id, AppStatus::Healthy, Some(&url), diag)
            .await;

        info!(%url, container = %container_id, "deployment running");
        Ok(Outcome::Running {
            deployment_id: id,
            url,
        })
    }

    /// Record a step failure on the deployment and its app.
    async fn fail(
        &self,
        deployment: &Deployment,
        stage: Stage,
        message: String,
        diag: &mut Diagnostics,
    ) -> Result<Outcome, EngineError> {
        error!(%stage, error = %message, "deployment failed");

        self.store
            .update_error(deployment.id, &message)
            .await
            .map_err(|source| EngineError::Persist {
                id: deployment.id,
                field: "error_message",
                source,
            })?;
        self.mark_app(deployment.app_id, AppStatus::Failed, None, diag)
            .await;

        Ok(Outcome::Failed {
            deployment_id: deployment.id,
            stage,
            message,
        })
    }

    async fn persist_build_log(&self, id: DeploymentId, log: &str, diag: &mut Diagnostics) {
        if let Err(e) = self.store.update_build_log(id, log).await {
            diag.warn(Warning::build_log_persist(format!(
                "failed to store build log for deployment {}: {}",
                id, e
            )));
        }
    }
}
