// ABOUTME: Test support utilities.
// ABOUTME: Tracing init plus in-process fakes for the runtime, the fetcher, and a failing store.

// Each test binary only uses some of these helpers, so allow dead_code.
#![allow(dead_code)]

pub mod fakes;

use dockyard::engine::EngineConfig;
use dockyard::model::{App, NewApp};
use dockyard::store::{DeploymentStore, MemoryStore};
use std::sync::Once;
use std::time::Duration;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::from_default_env().add_directive("dockyard=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub const BASE_DOMAIN: &str = "apps.example.com";

/// Engine settings with intervals short enough for tests.
pub fn engine_config() -> EngineConfig {
    EngineConfig {
        poll_interval: Duration::from_millis(10),
        lock_retry_interval: Duration::from_millis(5),
        ..EngineConfig::new(BASE_DOMAIN)
    }
}

/// Register an app named `name` tracking `branch`.
pub async fn create_app<S: DeploymentStore>(store: &S, name: &str, branch: &str) -> App {
    store
        .create_app(NewApp {
            user_id: 1,
            name: name.to_string(),
            repo_url: format!("https://git.example.com/{}.git", name.to_lowercase()),
            branch: branch.to_string(),
        })
        .await
        .expect("create app")
}

/// A memory store holding one app called `Blog`.
pub async fn store_with_blog() -> (MemoryStore, App) {
    let store = MemoryStore::new();
    let app = create_app(&store, "Blog", "").await;
    (store, app)
}
