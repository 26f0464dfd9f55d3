// ABOUTME: Status command: prints a deployment record and its app.

use super::connection::connect_store;
use dockyard::config::Config;
use dockyard::error::Result;
use dockyard::output::Output;
use dockyard::store::DeploymentStore;
use dockyard::types::DeploymentId;

pub async fn status(config: Config, id: DeploymentId, build_log: bool, output: Output) -> Result<()> {
    let store = connect_store(&config, &output).await?;
    let mut deployment = store.get_deployment(id).await?;
    let app = store.get_app(deployment.app_id).await?;

    if !build_log {
        deployment.build_log = None;
    }

    output.record(&deployment, || {
        println!("Deployment: {}", deployment.id);
        println!("App:        {} ({})", app.name, app.id);
        println!("Status:     {}", deployment.status);
        if let Some(image) = &deployment.image_name {
            println!("Image:      {}", image);
        }
        if let Some(container) = &deployment.container_id {
            println!("Container:  {}", container);
        }
        if let Some(url) = &app.url {
            println!("URL:        {}", url);
        }
        if let Some(error) = &deployment.error_message {
            println!("Error:      {}", error);
        }
        println!("Created:    {}", deployment.created_at.to_rfc3339());
        println!("Updated:    {}", deployment.updated_at.to_rfc3339());
        if let Some(log) = &deployment.build_log {
            println!();
            println!("{}", log);
        }
    });
    Ok(())
}
