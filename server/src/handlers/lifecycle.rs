use std::path::Path;

use anyhow::Result;
use xcode_bsp_types::bsp::{FileSystemWatcher, InitializeBuildResult, SourceKitInitializeData};
use xcode_bsp_utils::sha256_hex;

use crate::context::ServerContext;
use crate::watch::WATCHED_GLOBS;

pub(super) async fn initialize(ctx: &ServerContext) -> Result<InitializeBuildResult> {
    let snapshot = ctx.graph.snapshot().await?;
    let index_store_path = snapshot.index_store_path.clone();
    let index_database_path = index_store_path
        .as_deref()
        .map(|store| index_database_path(&ctx.cache_dir, store));
    tracing::debug!(
        "initialize: index store {}, index database {}",
        index_store_path.as_deref().unwrap_or("none"),
        index_database_path.as_deref().unwrap_or("none"),
    );

    Ok(InitializeBuildResult::new(SourceKitInitializeData {
        index_database_path,
        index_store_path,
        watches: WATCHED_GLOBS
            .iter()
            .map(|pattern| FileSystemWatcher {
                glob_pattern: (*pattern).to_string(),
            })
            .collect(),
        prepare_provider: true,
        source_kit_options_provider: true,
        wait_for_build_system_updates_provider: true,
    }))
}

/// `<cache_dir>/indexDatabase-<sha256(index store path)>`
fn index_database_path(cache_dir: &Path, index_store_path: &str) -> String {
    cache_dir
        .join(format!("indexDatabase-{}", sha256_hex(index_store_path)))
        .to_string_lossy()
        .into_owned()
}

pub(super) fn shutdown(ctx: &ServerContext) {
    tracing::info!("shutdown requested");
    ctx.state.mark_shutdown_received();
}

/// 0 after a `build/shutdown`, 1 otherwise.
#[must_use]
pub fn exit_code(ctx: &ServerContext) -> i32 {
    i32::from(!ctx.state.has_received_shutdown())
}
