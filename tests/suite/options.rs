//! `textDocument/sourceKitOptions` hits, misses and stale entries.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{Value, json};
use xcode_bsp_store::{ArgumentStore, InMemoryArgumentStore};

use crate::common::{FixtureProject, RecordingTrigger, ServerBuilder, args, swift_file};

const APP: &str = "xcode://p?scheme=App";

fn options_params(file: &str) -> Value {
    json!({
        "language": "swift",
        "textDocument": {"uri": format!("file://{file}")},
        "target": {"uri": APP}
    })
}

#[tokio::test]
async fn miss_falls_back_to_prepared_arguments() {
    let store = Arc::new(InMemoryArgumentStore::new());
    store
        .update_args(
            &BTreeMap::from([(
                "/p/Generated.swift".to_string(),
                args(&["swiftc", "-working-directory", "/w"]),
            )]),
            "App",
        )
        .unwrap();
    let trigger = Arc::new(RecordingTrigger::default());
    let project = FixtureProject::new().with_file("App", "App", "/p/File.swift", swift_file(&["swiftc"]));
    let mut server = ServerBuilder::new(project)
        .store(store)
        .trigger(Arc::clone(&trigger))
        .start();

    let response = server
        .request(1, "textDocument/sourceKitOptions", options_params("/p/Generated.swift"))
        .await;

    assert_eq!(
        response["result"]["compilerArguments"],
        json!(["swiftc", "-working-directory", "/w"])
    );
    assert_eq!(response["result"]["workingDirectory"], "/w");
    assert_eq!(trigger.reasons(), vec![format!("sourceKitOptions-miss:{APP}")]);
}

#[tokio::test]
async fn miss_without_stored_arguments_is_empty() {
    let trigger = Arc::new(RecordingTrigger::default());
    let project = FixtureProject::new().with_file("App", "App", "/p/File.swift", swift_file(&["swiftc"]));
    let mut server = ServerBuilder::new(project).trigger(Arc::clone(&trigger)).start();

    let response = server
        .request(1, "textDocument/sourceKitOptions", options_params("/p/Unknown.swift"))
        .await;

    assert_eq!(response["result"], json!({"compilerArguments": []}));
    assert_eq!(trigger.reasons(), vec![format!("sourceKitOptions-miss:{APP}")]);
}

#[tokio::test]
async fn missing_module_map_answers_empty_and_refreshes() {
    let trigger = Arc::new(RecordingTrigger::default());
    let project = FixtureProject::new().with_file(
        "App",
        "App",
        "/p/File.swift",
        swift_file(&[
            "swiftc",
            "-Xcc",
            "-fmodule-map-file=/nonexistent/derived/Module.modulemap",
        ]),
    );
    let mut server = ServerBuilder::new(project).trigger(Arc::clone(&trigger)).start();

    let response = server
        .request(1, "textDocument/sourceKitOptions", options_params("/p/File.swift"))
        .await;

    assert_eq!(response["result"]["compilerArguments"], json!([]));
    assert_eq!(
        trigger.reasons(),
        vec![format!("sourceKitOptions-stale-paths:{APP}")]
    );
}

#[tokio::test]
async fn non_file_document_is_empty_without_refresh() {
    let trigger = Arc::new(RecordingTrigger::default());
    let project = FixtureProject::new().with_file("App", "App", "/p/File.swift", swift_file(&["swiftc"]));
    let mut server = ServerBuilder::new(project).trigger(Arc::clone(&trigger)).start();

    let response = server
        .request(
            1,
            "textDocument/sourceKitOptions",
            json!({
                "textDocument": {"uri": "untitled:Untitled-1"},
                "target": {"uri": APP}
            }),
        )
        .await;

    assert_eq!(response["result"]["compilerArguments"], json!([]));
    assert!(trigger.reasons().is_empty());
}

#[tokio::test]
async fn register_for_changes_accepts_missing_params() {
    let mut server = ServerBuilder::new(FixtureProject::new()).start();

    let registered = server
        .request(
            1,
            "textDocument/registerForChanges",
            json!({"action": "register", "uri": "file:///p/File.swift"}),
        )
        .await;
    let bare = server.request(2, "textDocument/registerForChanges", Value::Null).await;

    assert_eq!(registered["result"], Value::Null);
    assert_eq!(bare["result"], Value::Null);
}
