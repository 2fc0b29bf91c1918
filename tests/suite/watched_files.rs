//! `workspace/didChangeWatchedFiles` filtering.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};

use crate::common::{FixtureProject, RecordingTrigger, ServerBuilder, swift_file};

async fn reasons_after(changes: Value) -> Vec<String> {
    let trigger = Arc::new(RecordingTrigger::default());
    let mut server = ServerBuilder::new(FixtureProject::new())
        .trigger(Arc::clone(&trigger))
        .start();

    server
        .notify("workspace/didChangeWatchedFiles", json!({"changes": changes}))
        .await;
    // Notifications are handled on the read loop before later messages are dispatched.
    server
        .request(1, "workspace/waitForBuildSystemUpdates", Value::Null)
        .await;
    trigger.reasons()
}

#[tokio::test]
async fn source_change_requests_refresh() {
    let reasons = reasons_after(json!([{"uri": "file:///p/Sources/A.swift", "type": 2}])).await;
    assert_eq!(reasons, vec!["didChangeWatchedFiles".to_string()]);
}

#[tokio::test]
async fn project_file_change_requests_refresh() {
    let reasons = reasons_after(json!([
        {"uri": "file:///p/App.xcodeproj/project.pbxproj", "type": 2}
    ]))
    .await;
    assert_eq!(reasons, vec!["didChangeWatchedFiles".to_string()]);
}

#[tokio::test]
async fn derived_data_changes_are_ignored() {
    let reasons = reasons_after(json!([
        {"uri": "file:///Users/me/Library/Developer/Xcode/DerivedData/App/Build/A.swift", "type": 1},
        {"uri": "file:///p/README.md", "type": 2}
    ]))
    .await;
    assert!(reasons.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn wait_covers_refresh_started_by_watched_change() {
    let project = FixtureProject::new()
        .with_file("App", "App", "/p/A.swift", swift_file(&["swiftc"]))
        .with_uncached_delay(Duration::from_millis(300));
    let builder = ServerBuilder::new(project);
    let fixture = builder.project();
    let mut server = builder.start();

    server
        .write_all(&[
            json!({
                "jsonrpc": "2.0",
                "method": "workspace/didChangeWatchedFiles",
                "params": {"changes": [{"uri": "file:///p/A.swift", "type": 2}]}
            }),
            json!({"jsonrpc": "2.0", "id": 1, "method": "workspace/waitForBuildSystemUpdates"}),
        ])
        .await;
    let response = server.response(1).await;

    assert_eq!(response["result"], Value::Null);
    assert_eq!(fixture.uncached_loads(), 1);
    assert_eq!(server.notifications.len(), 1);
    assert_eq!(server.notifications[0]["method"], "buildTarget/didChange");
}
