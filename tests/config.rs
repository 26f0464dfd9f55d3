// ABOUTME: Integration tests for configuration parsing and validation.
// ABOUTME: Tests YAML parsing, env var interpolation, defaults, and discovery.

use dockyard::config::*;
use dockyard::error::Error;
use dockyard::runtime::{RestartPolicyConfig, RuntimeType};
use std::path::PathBuf;
use std::time::Duration;

const MINIMAL: &str = r#"
database:
  url: postgres://dockyard@localhost/dockyard
engine:
  base_domain: apps.example.com
"#;

mod parsing {
    use super::*;

    #[test]
    fn parse_minimal_config_applies_defaults() {
        let config = Config::from_yaml(MINIMAL).unwrap();
        assert_eq!(config.engine.base_domain, "apps.example.com");
        assert_eq!(config.engine.image_prefix, "dockyard");
        assert_eq!(config.engine.poll_interval, Duration::from_secs(5));
        assert_eq!(config.engine.lock_retry_interval, Duration::from_secs(2));
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.database.acquire_timeout, Duration::from_secs(10));
        assert_eq!(config.routing.network, "dockyard");
        assert_eq!(config.routing.cert_resolver, "letsencrypt");
        assert_eq!(config.restart, RestartPolicy::UnlessStopped);
        assert!(config.runtime.runtime.is_none());
    }

    #[test]
    fn parse_full_config() {
        let yaml = r#"
database:
  url:
    env: DOCKYARD_DB
    default: postgres://localhost/dockyard
  max_connections: 8
  acquire_timeout: 30s

engine:
  base_domain: paas.internal
  image_prefix: builds
  poll_interval: 1m
  lock_retry_interval: 500ms
  work_dir: /var/lib/dockyard

routing:
  network: edge
  cert_resolver: internal-ca
  entrypoint: https

runtime:
  runtime: podman
  socket: /run/podman/podman.sock

restart: on-failure:3
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.database.max_connections, 8);
        assert_eq!(config.database.acquire_timeout, Duration::from_secs(30));
        assert_eq!(config.engine.image_prefix, "builds");
        assert_eq!(config.engine.poll_interval, Duration::from_secs(60));
        assert_eq!(config.engine.lock_retry_interval, Duration::from_millis(500));
        assert_eq!(config.work_dir(), PathBuf::from("/var/lib/dockyard"));
        assert_eq!(config.routing.network, "edge");
        assert_eq!(config.runtime.runtime, Some(RuntimeType::Podman));
        assert_eq!(
            config.restart,
            RestartPolicy::OnFailure {
                max_retries: Some(3)
            }
        );
    }

    #[test]
    fn missing_engine_section_returns_error() {
        let yaml = "database:\n  url: postgres://localhost/dockyard\n";
        assert!(Config::from_yaml(yaml).is_err());
    }

    #[test]
    fn unknown_restart_policy_returns_error() {
        let yaml = format!("{}restart: sometimes\n", MINIMAL);
        assert!(Config::from_yaml(&yaml).is_err());
    }
}

mod validation {
    use super::*;

    fn with_engine(engine: &str) -> String {
        format!(
            "database:\n  url: postgres://localhost/dockyard\nengine:\n{}",
            engine
        )
    }

    #[test]
    fn empty_base_domain_is_rejected() {
        let err = Config::from_yaml(&with_engine("  base_domain: \"\"\n")).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn dotted_edges_are_rejected() {
        assert!(Config::from_yaml(&with_engine("  base_domain: .example.com\n")).is_err());
        assert!(Config::from_yaml(&with_engine("  base_domain: example.com.\n")).is_err());
    }

    #[test]
    fn image_prefix_must_be_a_label() {
        let yaml = with_engine("  base_domain: example.com\n  image_prefix: My_Builds\n");
        assert!(matches!(
            Config::from_yaml(&yaml).unwrap_err(),
            Error::InvalidConfig(_)
        ));
    }

    #[test]
    fn zero_interval_is_rejected() {
        let yaml = with_engine("  base_domain: example.com\n  poll_interval: 0s\n");
        assert!(Config::from_yaml(&yaml).is_err());
    }

    #[test]
    fn single_connection_pool_is_rejected() {
        let yaml = MINIMAL.replace(
            "  url: postgres://dockyard@localhost/dockyard\n",
            "  url: postgres://dockyard@localhost/dockyard\n  max_connections: 1\n",
        );
        let err = Config::from_yaml(&yaml).unwrap_err();
        assert!(err.to_string().contains("max_connections"));
    }
}

mod env_values {
    use super::*;

    fn config_with_env(var: &str, default: Option<&str>) -> Config {
        let default = default
            .map(|d| format!("\n    default: {}", d))
            .unwrap_or_default();
        let yaml = format!(
            "database:\n  url:\n    env: {}{}\nengine:\n  base_domain: example.com\n",
            var, default
        );
        Config::from_yaml(&yaml).unwrap()
    }

    #[test]
    fn literal_url_resolves_as_is() {
        let config = Config::from_yaml(MINIMAL).unwrap();
        assert_eq!(
            config.database_url().unwrap(),
            "postgres://dockyard@localhost/dockyard"
        );
    }

    #[test]
    fn env_var_takes_precedence_over_default() {
        let config = config_with_env("DOCKYARD_TEST_DB_URL", Some("postgres://fallback/db"));
        temp_env::with_var("DOCKYARD_TEST_DB_URL", Some("postgres://from-env/db"), || {
            assert_eq!(config.database_url().unwrap(), "postgres://from-env/db");
        });
    }

    #[test]
    fn default_used_when_var_unset() {
        let config = config_with_env("DOCKYARD_TEST_DB_UNSET", Some("postgres://fallback/db"));
        temp_env::with_var_unset("DOCKYARD_TEST_DB_UNSET", || {
            assert_eq!(config.database_url().unwrap(), "postgres://fallback/db");
        });
    }

    #[test]
    fn missing_var_without_default_is_an_error() {
        let config = config_with_env("DOCKYARD_TEST_DB_MISSING", None);
        temp_env::with_var_unset("DOCKYARD_TEST_DB_MISSING", || {
            let err = config.database_url().unwrap_err();
            assert!(matches!(err, Error::MissingEnvVar(ref v) if v == "DOCKYARD_TEST_DB_MISSING"));
        });
    }

    #[test]
    fn describe_never_reveals_values() {
        let literal = EnvValue::Literal("postgres://user:secret@db/app".to_string());
        assert!(!literal.describe().contains("secret"));
        let from_env = EnvValue::FromEnv {
            var: "DATABASE_URL".to_string(),
            default: Some("postgres://user:secret@db/app".to_string()),
        };
        assert_eq!(from_env.describe(), "$DATABASE_URL");
    }
}

mod derived {
    use super::*;

    #[test]
    fn engine_config_carries_routing_and_restart() {
        let yaml = format!("{}restart: always\nrouting:\n  network: edge\n", MINIMAL);
        let config = Config::from_yaml(&yaml).unwrap();
        let engine = config.engine_config();
        assert_eq!(engine.base_domain, "apps.example.com");
        assert_eq!(engine.launch.network, "edge");
        assert_eq!(engine.launch.restart_policy, RestartPolicyConfig::Always);
    }

    #[test]
    fn app_port_is_not_configurable() {
        let yaml = format!("{}routing:\n  network: edge\n  port: 3000\n", MINIMAL);
        let err = Config::from_yaml(&yaml).unwrap_err();
        assert!(err.to_string().contains("port"), "error: {}", err);
    }

    #[test]
    fn work_dir_defaults_under_temp() {
        let config = Config::from_yaml(MINIMAL).unwrap();
        assert_eq!(config.work_dir(), std::env::temp_dir().join("dockyard"));
    }
}

mod discovery {
    use super::*;

    #[test]
    fn discovers_primary_file_name() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILENAME), MINIMAL).unwrap();
        assert!(Config::discover(dir.path()).is_ok());
    }

    #[test]
    fn discovers_dot_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join(".dockyard")).unwrap();
        std::fs::write(dir.path().join(CONFIG_FILENAME_DIR), MINIMAL).unwrap();
        assert!(Config::discover(dir.path()).is_ok());
    }

    #[test]
    fn missing_file_is_reported_with_the_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::discover(dir.path()).unwrap_err();
        assert!(matches!(err, Error::ConfigNotFound(ref p) if p == dir.path()));
    }

    #[test]
    fn init_refuses_to_overwrite_without_force() {
        let dir = tempfile::tempdir().unwrap();
        init_config(dir.path(), Some("paas.example.org"), false).unwrap();
        let err = init_config(dir.path(), None, false).unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));

        init_config(dir.path(), None, true).unwrap();
        let config = Config::discover(dir.path()).unwrap();
        assert_eq!(config.engine.base_domain, "apps.example.com");
    }

    #[test]
    fn init_writes_the_given_domain() {
        let dir = tempfile::tempdir().unwrap();
        init_config(dir.path(), Some("paas.example.org"), false).unwrap();
        let config = Config::discover(dir.path()).unwrap();
        assert_eq!(config.engine.base_domain, "paas.example.org");
    }
}
