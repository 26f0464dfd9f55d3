// ABOUTME: Integration tests for tearing down a deployment's container.
// ABOUTME: Runs a deployment through the engine, then removes its container with the launcher.

mod support;

use dockyard::engine::Engine;
use dockyard::launch::{self, Teardown, TeardownError};
use dockyard::store::DeploymentStore;
use dockyard::types::{ContainerId, DeploymentId};
use std::time::Duration;
use support::fakes::{FakeFetcher, FakeRuntime, FetchScript};

/// Deploy the Blog app once and return the runtime and its deployment.
async fn running_deployment() -> (FakeRuntime, DeploymentId, ContainerId) {
    support::init_tracing();
    let (store, app) = support::store_with_blog().await;
    let queued = store.create_deployment(app.id).await.unwrap();
    let runtime = FakeRuntime::new();
    let fetcher = FakeFetcher::new(FetchScript::WithDockerfile);

    Engine::new(store.clone(), runtime.clone(), fetcher, support::engine_config())
        .process_next()
        .await
        .unwrap();

    let deployment = store.get_deployment(queued.id).await.unwrap();
    let container = ContainerId::new(deployment.container_id.expect("container recorded"));
    (runtime, queued.id, container)
}

#[tokio::test]
async fn running_container_is_stopped_then_removed() {
    let (runtime, id, container) = running_deployment().await;
    assert_eq!(runtime.started(), vec![container.clone()]);

    let result = launch::teardown(&runtime, &container, id, Duration::from_secs(1))
        .await
        .unwrap();

    assert_eq!(result, Teardown::Removed);
    assert_eq!(runtime.stopped(), vec![container.clone()]);
    assert_eq!(runtime.removed(), vec![container]);
    assert!(runtime.started().is_empty());
}

#[tokio::test]
async fn second_teardown_finds_nothing_to_remove() {
    let (runtime, id, container) = running_deployment().await;
    launch::teardown(&runtime, &container, id, Duration::from_secs(1))
        .await
        .unwrap();

    let again = launch::teardown(&runtime, &container, id, Duration::from_secs(1))
        .await
        .unwrap();

    assert_eq!(again, Teardown::AlreadyGone);
    assert_eq!(runtime.removed().len(), 1);
}

#[tokio::test]
async fn container_of_another_deployment_is_left_alone() {
    let (runtime, _, container) = running_deployment().await;
    let other = DeploymentId::new(99);

    let err = launch::teardown(&runtime, &container, other, Duration::from_secs(1))
        .await
        .unwrap_err();

    match err {
        TeardownError::ForeignContainer {
            expected, found, ..
        } => {
            assert_eq!(expected, other);
            assert_eq!(found.as_deref(), Some("1"));
        }
        e => panic!("expected a foreign container error, got {e:?}"),
    }
    assert!(runtime.stopped().is_empty());
    assert!(runtime.removed().is_empty());
    assert_eq!(runtime.started(), vec![container]);
}

#[tokio::test]
async fn unknown_container_counts_as_gone() {
    support::init_tracing();
    let runtime = FakeRuntime::new();

    let result = launch::teardown(
        &runtime,
        &ContainerId::new("container-7"),
        DeploymentId::new(1),
        Duration::from_secs(1),
    )
    .await
    .unwrap();

    assert_eq!(result, Teardown::AlreadyGone);
    assert!(runtime.removed().is_empty());
}
