//! BDD scenarios for the build pipeline.

use rstest_bdd_macros::scenario;

use super::test_helpers::{BuildWorld, build_world};

#[scenario(
    path = "tests/features/build.feature",
    name = "Build a template from a source storage"
)]
fn scenario_build_template(build_world: BuildWorld) {
    let _ = build_world;
}

#[scenario(
    path = "tests/features/build.feature",
    name = "Provisioning failure tears the server down"
)]
fn scenario_provisioning_failure(build_world: BuildWorld) {
    let _ = build_world;
}

#[scenario(
    path = "tests/features/build.feature",
    name = "Refuse to build without a source storage"
)]
fn scenario_missing_source(build_world: BuildWorld) {
    let _ = build_world;
}
