//! `buildTarget/prepare` and the updates it announces.

use std::sync::Arc;

use serde_json::{Value, json};
use xcode_bsp_store::InMemoryArgumentStore;

use crate::common::{FixtureProject, ServerBuilder, args, swift_file};

const APP: &str = "xcode://p?scheme=App";

fn prepare_params() -> Value {
    json!({"targets": [{"uri": APP}]})
}

#[tokio::test]
async fn prepare_persists_arguments_under_scheme_scope() {
    let store = Arc::new(InMemoryArgumentStore::new());
    let project = FixtureProject::new()
        .with_file("App", "App", "/p/A.swift", swift_file(&["swiftc", "-DA"]))
        .with_file("App", "App", "/p/B.swift", swift_file(&["swiftc", "-DB"]));
    let builder = ServerBuilder::new(project).store(store.clone());
    let fixture = builder.project();
    let mut server = builder.start();

    let response = server.request(1, "buildTarget/prepare", prepare_params()).await;

    assert_eq!(response["result"], Value::Null);
    let stored = store.scope("App");
    assert_eq!(stored["/p/A.swift"], args(&["swiftc", "-DA"]));
    assert_eq!(stored["/p/B.swift"], args(&["swiftc", "-DB"]));
    assert!(fixture.warmups().is_empty());
}

#[tokio::test]
async fn prepare_announces_new_targets_before_responding() {
    let project = FixtureProject::new()
        .with_file("App", "App", "/p/A.swift", swift_file(&["swiftc"]))
        .with_file("App", "Tests", "/p/T.swift", swift_file(&["swiftc"]));
    let mut server = ServerBuilder::new(project).start();

    server.request(1, "buildTarget/prepare", prepare_params()).await;

    assert_eq!(server.notifications.len(), 1);
    let notification = &server.notifications[0];
    assert_eq!(notification["method"], "buildTarget/didChange");
    assert_eq!(
        notification["params"]["changes"],
        json!([
            {"target": {"uri": APP}, "kind": 2},
            {"target": {"uri": "xcode://p?scheme=App&target=Tests"}, "kind": 2}
        ])
    );
}

#[tokio::test]
async fn missing_module_map_triggers_warmup_build() {
    let project = FixtureProject::new().with_file(
        "App",
        "App",
        "/p/A.swift",
        swift_file(&["swiftc", "-fmodule-map-file", "/nonexistent/Module.modulemap"]),
    );
    let builder = ServerBuilder::new(project);
    let fixture = builder.project();
    let mut server = builder.start();

    let response = server.request(1, "buildTarget/prepare", prepare_params()).await;

    assert_eq!(response["result"], Value::Null);
    assert_eq!(fixture.warmups(), vec!["App".to_string()]);
}

#[tokio::test]
async fn unparseable_target_is_skipped() {
    let store = Arc::new(InMemoryArgumentStore::new());
    let project = FixtureProject::new().with_file("App", "App", "/p/A.swift", swift_file(&["swiftc"]));
    let mut server = ServerBuilder::new(project).store(store.clone()).start();

    let response = server
        .request(
            1,
            "buildTarget/prepare",
            json!({"targets": [{"uri": "file:///p/A.swift"}]}),
        )
        .await;

    assert_eq!(response["result"], Value::Null);
    assert!(store.scope("App").is_empty());
}

#[tokio::test]
async fn wait_for_updates_returns_when_idle() {
    let mut server = ServerBuilder::new(FixtureProject::new()).start();

    let response = server
        .request(1, "workspace/waitForBuildSystemUpdates", Value::Null)
        .await;

    assert_eq!(response["result"], Value::Null);
    assert!(response.get("error").is_none());
}
