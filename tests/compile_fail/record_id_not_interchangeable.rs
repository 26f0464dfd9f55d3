// ABOUTME: Compile-fail test verifying AppId and DeploymentId are not interchangeable.
// ABOUTME: This test should fail to compile, validating type safety.

use dockyard::types::{AppId, DeploymentId};

fn takes_deployment_id(_id: DeploymentId) {}

fn main() {
    let app_id = AppId::new(1);
    takes_deployment_id(app_id); // ERROR: expected DeploymentId, found AppId
}
