//! Build targets, their sources and the inverse lookup.

use serde_json::json;

use crate::common::{FixtureProject, ServerBuilder, swift_file};

const APP: &str = "xcode://p?scheme=App";
const APP_TESTS: &str = "xcode://p?scheme=App&target=Tests";

#[tokio::test]
async fn single_scheme_end_to_end() {
    let project = FixtureProject::new().with_file(
        "App",
        "App",
        "/p/File.swift",
        swift_file(&["swiftc", "-working-directory", "/p"]),
    );
    let mut server = ServerBuilder::new(project).start();

    let targets = server.request(1, "workspace/buildTargets", json!({})).await;
    let targets = targets["result"]["targets"].as_array().unwrap().clone();
    assert_eq!(targets.len(), 1);
    assert_eq!(targets[0]["id"]["uri"], APP);
    assert_eq!(targets[0]["displayName"], "App");
    assert_eq!(targets[0]["tags"], json!([]));
    assert_eq!(targets[0]["capabilities"]["canCompile"], true);

    let options = server
        .request(
            2,
            "textDocument/sourceKitOptions",
            json!({
                "language": "swift",
                "textDocument": {"uri": "file:///p/File.swift"},
                "target": {"uri": APP}
            }),
        )
        .await;
    assert_eq!(
        options["result"]["compilerArguments"],
        json!(["swiftc", "-working-directory", "/p"])
    );
    assert_eq!(options["result"]["workingDirectory"], "/p");
}

#[tokio::test]
async fn file_in_scheme_and_nested_target_maps_back_to_both() {
    let project = FixtureProject::new()
        .with_file("App", "App", "/p/File.swift", swift_file(&["swiftc"]))
        .with_file("App", "Tests", "/p/File.swift", swift_file(&["swiftc", "-DTESTS"]));
    let mut server = ServerBuilder::new(project).start();

    let targets = server.request(1, "workspace/buildTargets", json!({})).await;
    let app = targets["result"]["targets"]
        .as_array()
        .unwrap()
        .iter()
        .find(|target| target["id"]["uri"] == APP)
        .cloned()
        .unwrap();
    assert_eq!(app["dependencies"], json!([{"uri": APP_TESTS}]));

    let inverse = server
        .request(
            2,
            "buildTarget/inverseSources",
            json!({"textDocument": {"uri": "file:///p/File.swift"}}),
        )
        .await;
    assert_eq!(
        inverse["result"]["targets"],
        json!([{"uri": APP}, {"uri": APP_TESTS}])
    );
}

#[tokio::test]
async fn inverse_sources_of_foreign_uri_is_empty() {
    let project = FixtureProject::new().with_file("App", "App", "/p/File.swift", swift_file(&[]));
    let mut server = ServerBuilder::new(project).start();

    let inverse = server
        .request(
            1,
            "buildTarget/inverseSources",
            json!({"textDocument": {"uri": "untitled:Untitled-1"}}),
        )
        .await;
    assert_eq!(inverse["result"]["targets"], json!([]));
}

#[tokio::test]
async fn sources_list_files_and_roots() {
    let project = FixtureProject::new()
        .with_file("App", "App", "/p/Sources/B.swift", swift_file(&["swiftc"]))
        .with_file("App", "App", "/p/Sources/A.swift", swift_file(&["swiftc"]))
        .with_file("App", "App", "/p/Support/C.m", swift_file(&["clang"]));
    let mut server = ServerBuilder::new(project).start();

    let response = server
        .request(
            1,
            "buildTarget/sources",
            json!({"targets": [{"uri": APP}, {"uri": "xcode://p?scheme=Missing"}]}),
        )
        .await;
    let items = response["result"]["items"].as_array().unwrap();

    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["target"]["uri"], APP);
    assert_eq!(
        items[0]["sources"],
        json!([
            {"uri": "file:///p/Sources/A.swift", "kind": 1, "generated": false},
            {"uri": "file:///p/Sources/B.swift", "kind": 1, "generated": false},
            {"uri": "file:///p/Support/C.m", "kind": 1, "generated": false}
        ])
    );
    assert_eq!(
        items[0]["roots"],
        json!(["file:///p/Sources/", "file:///p/Support/"])
    );
    assert_eq!(items[1]["sources"], json!([]));
    assert_eq!(items[1]["roots"], json!([]));
}
