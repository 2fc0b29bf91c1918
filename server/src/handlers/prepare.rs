//! `buildTarget/prepare`: refresh, optionally warm up, persist compiler arguments.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use xcode_bsp_engine::{BuildGraphSnapshot, has_missing_module_map};
use xcode_bsp_store::ArgumentsByPath;
use xcode_bsp_types::bsp::{TargetIdentifier, TargetsParams};
use xcode_bsp_types::{CompilerOptions, TargetUri};

use crate::context::ServerContext;

pub(super) async fn prepare(ctx: &ServerContext, params: TargetsParams) -> Result<()> {
    ctx.state.begin_update();
    let result = prepare_targets(ctx, &params.targets).await;
    ctx.state.end_update();

    if let Err(err) = ctx.emitter.emit().await {
        tracing::warn!("Failed to send pending notifications: {err:#}");
    }
    result
}

async fn prepare_targets(ctx: &ServerContext, targets: &[TargetIdentifier]) -> Result<()> {
    let initial = ctx.graph.refresh(true).await?;
    ctx.state.record_refresh_changes(&initial);
    let project = ctx.graph.project_name();

    let parsed: Vec<(&TargetIdentifier, TargetUri)> = targets
        .iter()
        .filter_map(|target| match TargetUri::parse(&target.uri) {
            Ok(uri) => Some((target, uri)),
            Err(err) => {
                tracing::warn!("Skipping prepare: {err}");
                None
            }
        })
        .collect();

    let warmup: BTreeSet<&str> = parsed
        .iter()
        .filter(|(target, uri)| {
            options_of(&initial.snapshot, target, uri, project).is_some_and(|by_file| {
                by_file
                    .values()
                    .any(|options| has_missing_module_map(&options.options, path_exists))
            })
        })
        .map(|(_, uri)| uri.scheme())
        .collect();

    let mut snapshot = Arc::clone(&initial.snapshot);
    if !warmup.is_empty() {
        for scheme in &warmup {
            tracing::debug!("prepare: warmup build started for scheme {scheme}");
            match ctx.graph.warmup_build(scheme).await {
                Ok(()) => tracing::debug!("prepare: warmup build finished for scheme {scheme}"),
                Err(err) => tracing::warn!("Warmup build failed for scheme {scheme}: {err:#}"),
            }
        }
        let refreshed = ctx.graph.refresh(false).await?;
        ctx.state.record_refresh_changes(&refreshed);
        snapshot = refreshed.snapshot;
    }

    for (target, uri) in &parsed {
        let Some(by_file) =
            options_of(&snapshot, target, uri, project).filter(|by_file| !by_file.is_empty())
        else {
            tracing::debug!("prepare: no compiler arguments for {}", target.uri);
            continue;
        };

        let arguments: ArgumentsByPath = by_file
            .iter()
            .map(|(path, options)| (path.clone(), options.options.clone()))
            .collect();
        let store = Arc::clone(&ctx.store);
        let scope = uri.cache_scope();
        let stored = tokio::task::spawn_blocking(move || store.update_args(&arguments, &scope))
            .await
            .context("Argument store task failed");
        match stored {
            Ok(Ok(())) => tracing::debug!("prepare: stored compiler arguments for {}", target.uri),
            Ok(Err(err)) => {
                tracing::warn!("Failed to store compiler arguments for {}: {err}", target.uri);
            }
            Err(err) => {
                tracing::warn!("Failed to store compiler arguments for {}: {err:#}", target.uri);
            }
        }
    }
    Ok(())
}

/// Per-file options of a target, by the uri as sent or re-rooted under this project.
fn options_of<'a>(
    snapshot: &'a BuildGraphSnapshot,
    target: &TargetIdentifier,
    uri: &TargetUri,
    project: &str,
) -> Option<&'a BTreeMap<String, CompilerOptions>> {
    snapshot
        .options_by_target_uri
        .get(&target.uri)
        .or_else(|| {
            snapshot
                .options_by_target_uri
                .get(&uri.with_project(project).to_string())
        })
}

fn path_exists(path: &str) -> bool {
    Path::new(path).exists()
}
