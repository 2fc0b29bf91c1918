use std::path::Path;
use std::sync::Arc;

use xcode_bsp_engine::has_missing_module_map;
use xcode_bsp_store::StoreError;
use xcode_bsp_types::bsp::{RegisterForChangesParams, SourceKitOptionsParams, SourceKitOptionsResult};
use xcode_bsp_types::{TargetUri, working_directory};

use super::document_path;
use crate::context::ServerContext;

pub(super) fn register_for_changes(ctx: &ServerContext, params: &RegisterForChangesParams) {
    tracing::trace!(
        "registerForChanges action={} uri={}",
        params.action.as_deref().unwrap_or("register"),
        params.uri.as_deref().unwrap_or("none")
    );
    ctx.state
        .update_registration(params.action.as_deref(), params.uri.as_deref());
}

/// Never fails: misses and stale entries answer empty and schedule a refresh.
pub(super) async fn source_kit_options(
    ctx: &ServerContext,
    params: SourceKitOptionsParams,
) -> SourceKitOptionsResult {
    let target_uri = params.target.uri;
    tracing::trace!(
        "sourceKitOptions language={} target={target_uri} document={}",
        params.language.as_deref().unwrap_or("none"),
        params.text_document.uri
    );

    let Some(path) = document_path(&params.text_document.uri) else {
        tracing::trace!("sourceKitOptions ignored non-file document");
        return SourceKitOptionsResult::default();
    };

    let snapshot = match ctx.graph.snapshot().await {
        Ok(snapshot) => Some(snapshot),
        Err(err) => {
            tracing::warn!("Build graph unavailable for sourceKitOptions: {err:#}");
            None
        }
    };

    if let Some(options) = snapshot
        .as_deref()
        .and_then(|snapshot| snapshot.options_for(&path, Some(&target_uri)))
    {
        if has_missing_module_map(&options.options, |p| Path::new(p).exists()) {
            ctx.refresh
                .request_refresh(&format!("sourceKitOptions-stale-paths:{target_uri}"));
            tracing::trace!("sourceKitOptions hit with missing module map for {path}");
            return SourceKitOptionsResult::default();
        }
        tracing::trace!(
            "sourceKitOptions hit for {path} ({} arguments)",
            options.options.len()
        );
        return SourceKitOptionsResult {
            compiler_arguments: options.options.clone(),
            working_directory: options.working_directory.clone(),
        };
    }

    tracing::debug!("sourceKitOptions miss for {path} in {target_uri}");
    let stored = stored_arguments(ctx, &target_uri, &path).await;
    ctx.refresh
        .request_refresh(&format!("sourceKitOptions-miss:{target_uri}"));

    stored.map_or_else(SourceKitOptionsResult::default, |arguments| {
        SourceKitOptionsResult {
            working_directory: working_directory(&arguments),
            compiler_arguments: arguments,
        }
    })
}

/// Arguments persisted by an earlier prepare, under the target's cache scope.
async fn stored_arguments(ctx: &ServerContext, target_uri: &str, path: &str) -> Option<Vec<String>> {
    let scope = match TargetUri::parse(target_uri) {
        Ok(uri) => uri.cache_scope(),
        Err(err) => {
            tracing::debug!("No stored arguments: {err}");
            return None;
        }
    };

    let store = Arc::clone(&ctx.store);
    let path = path.to_string();
    match tokio::task::spawn_blocking(move || store.fetch_args(&path, &scope)).await {
        Ok(Ok(arguments)) => Some(arguments),
        Ok(Err(err @ StoreError::NotFound { .. })) => {
            tracing::debug!("{err}");
            None
        }
        Ok(Err(err)) => {
            tracing::warn!("Failed to read stored arguments: {err}");
            None
        }
        Err(err) => {
            tracing::warn!("Argument store task failed: {err}");
            None
        }
    }
}
