//! Initialize handshake and process exit codes.

use serde_json::{Value, json};

use crate::common::{FixtureProject, ServerBuilder, swift_file};

fn indexed_project() -> FixtureProject {
    FixtureProject::new().with_file(
        "App",
        "App",
        "/p/File.swift",
        swift_file(&["swiftc", "-index-store-path", "/d/Index.noindex/DataStore"]),
    )
}

#[tokio::test]
async fn initialize_reports_sourcekit_capabilities() {
    let mut server = ServerBuilder::new(indexed_project()).start();

    let response = server.request(1, "build/initialize", json!({})).await;
    let result = &response["result"];

    assert_eq!(result["displayName"], "xcode-bsp");
    assert_eq!(result["bspVersion"], "2.0.0");
    assert_eq!(result["dataKind"], "sourceKit");
    assert_eq!(
        result["capabilities"]["languageIds"],
        json!(["swift", "objective-c", "objective-cpp", "c", "cpp"])
    );

    let data = &result["data"];
    assert_eq!(data["indexStorePath"], "/d/Index.noindex/DataStore");
    let database = data["indexDatabasePath"].as_str().unwrap();
    assert!(database.starts_with("/cache/indexDatabase-"), "{database}");
    assert_eq!(data["prepareProvider"], true);
    assert_eq!(data["sourceKitOptionsProvider"], true);
    assert_eq!(data["waitForBuildSystemUpdatesProvider"], true);
    assert!(
        data["watches"]
            .as_array()
            .unwrap()
            .contains(&json!({"globPattern": "**/*.swift"}))
    );
}

#[tokio::test]
async fn initialize_is_stable_across_calls() {
    let mut server = ServerBuilder::new(indexed_project()).start();

    let first = server.request(1, "build/initialize", json!({})).await;
    let second = server.request(2, "build/initialize", json!({})).await;

    assert_eq!(first["result"]["data"], second["result"]["data"]);
}

#[tokio::test]
async fn shutdown_then_exit_exits_cleanly() {
    let mut server = ServerBuilder::new(FixtureProject::new()).start();

    server.notify("build/initialized", json!({})).await;
    let response = server.request(1, "build/shutdown", Value::Null).await;
    assert_eq!(response["result"], Value::Null);

    assert_eq!(server.exit().await, 0);
}

#[tokio::test]
async fn exit_without_shutdown_is_an_error_exit() {
    let server = ServerBuilder::new(FixtureProject::new()).start();
    assert_eq!(server.exit().await, 1);
}

#[tokio::test]
async fn unknown_request_is_method_not_found() {
    let mut server = ServerBuilder::new(FixtureProject::new()).start();

    let response = server.request(9, "build/compile", json!({})).await;

    assert_eq!(response["error"]["code"], -32601);
    assert_eq!(response["error"]["message"], "Method not found: build/compile");
}
