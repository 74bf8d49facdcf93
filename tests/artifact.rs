//! Artifact identity, generated state, and destruction.

use std::sync::Arc;

use kiln::context::{SERVER_TITLE_KEY, SERVER_UUID_KEY};
use kiln::test_support::{DriverOp, RecordingUi, ScriptedDriver, UiLevel};
use kiln::{
    Artifact, BUILDER_ID, Driver, DriverError, GeneratedData, ResourceKind, Storage,
};

struct Built {
    driver: ScriptedDriver,
    artifact: Artifact,
}

/// Two templates made from the scripted source storage.
async fn built() -> Built {
    let driver = ScriptedDriver::new();
    let mut templates: Vec<Storage> = Vec::new();
    for title in ["img-a", "img-b"] {
        let template = driver
            .templatize("S1", title)
            .await
            .unwrap_or_else(|err| panic!("templatize: {err}"));
        templates.push(template);
    }
    let mut generated = GeneratedData::default();
    generated.insert(SERVER_UUID_KEY, "server-7");
    generated.insert(SERVER_TITLE_KEY, "img-20240101-000000");
    let artifact = Artifact::new(templates, generated, Arc::new(driver.clone()));
    Built { driver, artifact }
}

#[tokio::test]
async fn id_and_display_list_every_template() {
    let built = built().await;

    assert_eq!(built.artifact.builder_id(), BUILDER_ID);
    assert_eq!(built.artifact.id(), "template-1,template-2");
    assert_eq!(
        built.artifact.to_string(),
        "Storage template created, UUID: template-1,template-2"
    );
    assert_eq!(built.artifact.templates().len(), 2);
}

#[tokio::test]
async fn state_exposes_generated_values() {
    let built = built().await;

    assert_eq!(built.artifact.state(SERVER_UUID_KEY), Some("server-7"));
    assert_eq!(built.artifact.state("Missing"), None);
    assert_eq!(built.artifact.generated().iter().count(), 2);
}

#[tokio::test]
async fn destroy_deletes_every_template() {
    let built = built().await;
    let ui = RecordingUi::new();

    built
        .artifact
        .destroy(&ui)
        .await
        .unwrap_or_else(|err| panic!("destroy: {err}"));

    assert_eq!(built.driver.live_storages(), vec![String::from("S1")]);
    assert_eq!(ui.at(UiLevel::Say).len(), 2);
}

#[tokio::test]
async fn destroy_stops_at_the_first_failure() {
    let built = built().await;
    built.driver.fail(
        DriverOp::DeleteTemplate,
        DriverError::DeleteFailed {
            resource: ResourceKind::Template,
            id: String::from("template-1"),
            message: String::from("STORAGE_STATE_ILLEGAL"),
        },
    );

    let err = built
        .artifact
        .destroy(&RecordingUi::new())
        .await
        .expect_err("first delete fails");

    assert!(matches!(err, DriverError::DeleteFailed { ref id, .. } if id == "template-1"));
    assert_eq!(built.driver.count(DriverOp::DeleteTemplate), 1);
    assert!(built.driver.storage("template-2").is_some());
}
