// ABOUTME: Configuration types and parsing for dockyard.yml.
// ABOUTME: Handles YAML parsing, env var interpolation, defaults, and validation.

mod env_value;
mod init;
mod restart_policy;

pub use env_value::EnvValue;
pub use init::init_config;
pub use restart_policy::RestartPolicy;

use crate::engine::EngineConfig;
use crate::error::{Error, Result};
use crate::launch::LaunchSettings;
use crate::runtime::RuntimeConfig;
use crate::types::Subdomain;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILENAME: &str = "dockyard.yml";
pub const CONFIG_FILENAME_ALT: &str = "dockyard.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".dockyard/config.yml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,

    pub engine: EngineSection,

    #[serde(default)]
    pub routing: RoutingConfig,

    #[serde(default)]
    pub runtime: RuntimeConfig,

    #[serde(default)]
    pub restart: RestartPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: EnvValue,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_acquire_timeout", with = "humantime_serde")]
    pub acquire_timeout: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSection {
    /// Domain under which every deployment gets its subdomain.
    pub base_domain: String,

    #[serde(default = "default_image_prefix")]
    pub image_prefix: String,

    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,

    #[serde(default = "default_lock_retry_interval", with = "humantime_serde")]
    pub lock_retry_interval: Duration,

    /// Parent directory for checkouts; defaults to `$TMPDIR/dockyard`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_dir: Option<PathBuf>,
}

/// Reverse-proxy wiring. Apps are always routed to port 8080 inside the
/// container, so there is no port setting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoutingConfig {
    #[serde(default = "default_network")]
    pub network: String,

    #[serde(default = "default_cert_resolver")]
    pub cert_resolver: String,

    #[serde(default = "default_entrypoint")]
    pub entrypoint: String,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            network: default_network(),
            cert_resolver: default_cert_resolver(),
            entrypoint: default_entrypoint(),
        }
    }
}

fn default_max_connections() -> u32 {
    5
}

fn default_acquire_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_image_prefix() -> String {
    "dockyard".to_string()
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_lock_retry_interval() -> Duration {
    Duration::from_secs(2)
}

fn default_network() -> String {
    "dockyard".to_string()
}

fn default_cert_resolver() -> String {
    "letsencrypt".to_string()
}

fn default_entrypoint() -> String {
    "websecure".to_string()
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        for path in &candidates {
            if path.exists() {
                tracing::debug!(path = %path.display(), "loading configuration");
                return Self::load(path);
            }
        }

        Err(Error::ConfigNotFound(dir.to_path_buf()))
    }

    /// Reject values that would only fail later, mid-deployment.
    pub fn validate(&self) -> Result<()> {
        let base = self.engine.base_domain.trim();
        if base.is_empty() {
            return Err(Error::InvalidConfig("engine.base_domain is empty".to_string()));
        }
        if base.starts_with('.') || base.ends_with('.') || base.contains(char::is_whitespace) {
            return Err(Error::InvalidConfig(format!(
                "engine.base_domain is not a domain: {}",
                base
            )));
        }

        // The prefix must itself be a valid DNS-style label to form image names.
        Subdomain::new(&self.engine.image_prefix).map_err(|e| {
            Error::InvalidConfig(format!("engine.image_prefix: {}", e))
        })?;

        if self.engine.poll_interval.is_zero() || self.engine.lock_retry_interval.is_zero() {
            return Err(Error::InvalidConfig(
                "engine intervals must be greater than zero".to_string(),
            ));
        }
        if self.routing.network.trim().is_empty() {
            return Err(Error::InvalidConfig("routing.network is empty".to_string()));
        }
        if self.database.max_connections < 2 {
            // One connection is pinned while the build lock is held.
            return Err(Error::InvalidConfig(
                "database.max_connections must be at least 2".to_string(),
            ));
        }
        Ok(())
    }

    pub fn database_url(&self) -> Result<String> {
        self.database.url.resolve()
    }

    pub fn work_dir(&self) -> PathBuf {
        self.engine
            .work_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("dockyard"))
    }

    pub fn launch_settings(&self) -> LaunchSettings {
        LaunchSettings {
            network: self.routing.network.clone(),
            cert_resolver: self.routing.cert_resolver.clone(),
            entrypoint: self.routing.entrypoint.clone(),
            restart_policy: self.restart.into(),
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            base_domain: self.engine.base_domain.trim().to_string(),
            image_prefix: self.engine.image_prefix.clone(),
            poll_interval: self.engine.poll_interval,
            lock_retry_interval: self.engine.lock_retry_interval,
            launch: self.launch_settings(),
        }
    }

    pub fn template() -> Self {
        Config {
            database: DatabaseConfig {
                url: EnvValue::FromEnv {
                    var: "DATABASE_URL".to_string(),
                    default: Some("postgres://dockyard@localhost/dockyard".to_string()),
                },
                max_connections: default_max_connections(),
                acquire_timeout: default_acquire_timeout(),
            },
            engine: EngineSection {
                base_domain: "apps.example.com".to_string(),
                image_prefix: default_image_prefix(),
                poll_interval: default_poll_interval(),
                lock_retry_interval: default_lock_retry_interval(),
                work_dir: None,
            },
            routing: RoutingConfig::default(),
            runtime: RuntimeConfig::default(),
            restart: RestartPolicy::default(),
        }
    }
}
