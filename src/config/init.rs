// ABOUTME: Config scaffolding for new installations.
// ABOUTME: Creates a commented dockyard.yml template.

use std::path::Path;

use crate::error::{Error, Result};

use super::{CONFIG_FILENAME, Config};

pub fn init_config(dir: &Path, base_domain: Option<&str>, force: bool) -> Result<()> {
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() && !force {
        return Err(Error::AlreadyExists(config_path));
    }

    let mut config = Config::template();

    if let Some(domain) = base_domain {
        config.engine.base_domain = domain.to_string();
        config.validate()?;
    }

    let yaml = generate_template_yaml(&config);
    std::fs::write(&config_path, yaml)?;

    Ok(())
}

fn generate_template_yaml(config: &Config) -> String {
    format!(
        r#"database:
  # Literal URL, or read from the environment with an optional default
  url:
    env: DATABASE_URL
    default: postgres://dockyard@localhost/dockyard
  max_connections: {max_connections}
  acquire_timeout: {acquire_timeout}

engine:
  # Deployments are served at https://<app>-<deployment>.<base_domain>
  base_domain: {base_domain}
  image_prefix: {image_prefix}
  poll_interval: {poll_interval}
  lock_retry_interval: {lock_retry_interval}
  # work_dir: /var/lib/dockyard/checkouts

routing:
  # Network shared with the reverse proxy
  network: {network}
  cert_resolver: {cert_resolver}
  entrypoint: {entrypoint}
  # Apps must listen on port 8080

# runtime:
#   runtime: docker
#   socket: /var/run/docker.sock

restart: {restart}
"#,
        max_connections = config.database.max_connections,
        acquire_timeout = format_secs(config.database.acquire_timeout),
        base_domain = config.engine.base_domain,
        image_prefix = config.engine.image_prefix,
        poll_interval = format_secs(config.engine.poll_interval),
        lock_retry_interval = format_secs(config.engine.lock_retry_interval),
        network = config.routing.network,
        cert_resolver = config.routing.cert_resolver,
        entrypoint = config.routing.entrypoint,
        restart = config.restart,
    )
}

fn format_secs(d: std::time::Duration) -> String {
    format!("{}s", d.as_secs())
}
