use std::collections::BTreeSet;
use std::path::Path;

use anyhow::Result;
use xcode_bsp_rpc::{directory_uri, path_to_file_uri};
use xcode_bsp_types::LANGUAGE_IDS;
use xcode_bsp_types::bsp::{
    BspBuildTarget, BuildTargetCapabilities, InverseSourcesParams, InverseSourcesResult,
    SourceItem, SourceItemKind, SourcesItem, SourcesResult, TargetIdentifier, TargetsParams,
    WorkspaceBuildTargetsResult,
};

use super::document_path;
use crate::context::ServerContext;

pub(super) async fn build_targets(ctx: &ServerContext) -> Result<WorkspaceBuildTargetsResult> {
    let snapshot = ctx.graph.snapshot().await?;
    let targets = snapshot
        .targets
        .iter()
        .map(|target| BspBuildTarget {
            id: TargetIdentifier::new(target.uri.as_str()),
            display_name: target.display_name.clone(),
            tags: Vec::new(),
            language_ids: LANGUAGE_IDS.to_vec(),
            dependencies: target
                .dependencies
                .iter()
                .map(|uri| TargetIdentifier::new(uri.as_str()))
                .collect(),
            capabilities: BuildTargetCapabilities::default(),
        })
        .collect();
    Ok(WorkspaceBuildTargetsResult { targets })
}

pub(super) async fn sources(ctx: &ServerContext, params: TargetsParams) -> Result<SourcesResult> {
    let snapshot = ctx.graph.snapshot().await?;
    let items = params
        .targets
        .into_iter()
        .map(|target| {
            let files = snapshot.files_of(&target.uri);
            SourcesItem {
                sources: files
                    .iter()
                    .filter_map(|file| file_uri(file))
                    .map(|uri| SourceItem {
                        uri,
                        kind: SourceItemKind::File,
                        generated: false,
                    })
                    .collect(),
                roots: source_roots(files),
                target,
            }
        })
        .collect();
    Ok(SourcesResult { items })
}

pub(super) async fn inverse_sources(
    ctx: &ServerContext,
    params: InverseSourcesParams,
) -> Result<InverseSourcesResult> {
    let Some(path) = document_path(&params.text_document.uri) else {
        return Ok(InverseSourcesResult {
            targets: Vec::new(),
        });
    };
    let snapshot = ctx.graph.snapshot().await?;
    let targets = snapshot
        .targets_for(&path)
        .iter()
        .map(|uri| TargetIdentifier::new(uri.as_str()))
        .collect();
    Ok(InverseSourcesResult { targets })
}

fn file_uri(path: &str) -> Option<String> {
    match path_to_file_uri(Path::new(path)) {
        Ok(uri) => Some(uri.to_string()),
        Err(err) => {
            tracing::debug!("{err}");
            None
        }
    }
}

/// Distinct parent directories, sorted, as `file://` URIs ending in `/`.
fn source_roots(files: &[String]) -> Vec<String> {
    let directories: BTreeSet<String> = files
        .iter()
        .filter_map(|file| Path::new(file).parent())
        .map(|dir| dir.to_string_lossy().into_owned())
        .collect();
    directories
        .iter()
        .filter_map(|dir| directory_uri(Path::new(dir)).ok())
        .map(|uri| uri.to_string())
        .collect()
}
