use xcode_bsp_types::bsp::DidChangeWatchedFilesParams;

use crate::context::ServerContext;

pub(super) fn did_change_watched_files(ctx: &ServerContext, params: &DidChangeWatchedFilesParams) {
    let uris = params.changes.iter().map(|change| change.uri.as_str());
    if !ctx.watch_filter.has_relevant_change(uris) {
        tracing::debug!(
            "didChangeWatchedFiles ignored {} irrelevant changes",
            params.changes.len()
        );
        return;
    }

    tracing::debug!(
        "didChangeWatchedFiles: {} changes, invalidating build graph",
        params.changes.len()
    );
    ctx.graph.invalidate();
    ctx.refresh.request_refresh("didChangeWatchedFiles");
}
