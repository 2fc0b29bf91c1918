use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

use anyhow::{Context, Result};
use xcode_bsp_engine::{
    BackgroundRefreshCoordinator, BuildGraphService, BuildSystemState, RefreshAction,
    RefreshTrigger,
};
use xcode_bsp_rpc::MessageWriter;
use xcode_bsp_store::ArgumentStore;

use crate::emitter::PendingNotificationsEmitter;
use crate::watch::WatchFilter;

/// Everything a handler may touch, shared across message tasks.
pub struct ServerContext {
    pub cache_dir: PathBuf,
    pub graph: Arc<BuildGraphService>,
    pub state: Arc<BuildSystemState>,
    pub store: Arc<dyn ArgumentStore>,
    pub refresh: Arc<dyn RefreshTrigger>,
    pub emitter: Arc<PendingNotificationsEmitter>,
    pub writer: Arc<MessageWriter>,
    pub watch_filter: WatchFilter,
}

#[derive(Debug, Clone, Default)]
pub struct ServerOptions {
    pub cache_dir: PathBuf,
    /// Send `build/sourceKitOptionsChanged` for registered documents.
    pub source_kit_options_changed: bool,
}

impl ServerContext {
    pub fn new(
        graph: Arc<BuildGraphService>,
        store: Arc<dyn ArgumentStore>,
        writer: Arc<MessageWriter>,
        options: ServerOptions,
    ) -> Result<Self> {
        let state = Arc::new(BuildSystemState::new());
        let emitter = Arc::new(PendingNotificationsEmitter::new(
            Arc::clone(&writer),
            Arc::clone(&state),
            options.source_kit_options_changed,
        ));
        let refresh = Arc::new(BackgroundRefreshCoordinator::new(
            Arc::clone(&state),
            background_refresh(Arc::clone(&graph), Arc::clone(&state), Arc::clone(&emitter)),
        ));

        Ok(Self {
            cache_dir: options.cache_dir,
            graph,
            state,
            store,
            refresh,
            emitter,
            writer,
            watch_filter: WatchFilter::new().context("Failed to build watched file filter")?,
        })
    }

    /// Replace the background refresh trigger.
    #[must_use]
    pub fn with_refresh_trigger(mut self, refresh: Arc<dyn RefreshTrigger>) -> Self {
        self.refresh = refresh;
        self
    }
}

/// Uncached refresh followed by notifications.
///
/// The coordinator holds the update depth for the whole action, so idle waiters are
/// answered after the notifications go out.
fn background_refresh(
    graph: Arc<BuildGraphService>,
    state: Arc<BuildSystemState>,
    emitter: Arc<PendingNotificationsEmitter>,
) -> RefreshAction {
    Arc::new(
        move |reason: String| -> Pin<Box<dyn Future<Output = ()> + Send>> {
            let graph = Arc::clone(&graph);
            let state = Arc::clone(&state);
            let emitter = Arc::clone(&emitter);
            Box::pin(async move {
                match graph.refresh(false).await {
                    Ok(refresh) => state.record_refresh_changes(&refresh),
                    Err(err) => {
                        tracing::warn!("Background refresh failed (reason={reason}): {err:#}");
                    }
                }

                if let Err(err) = emitter.emit().await {
                    tracing::warn!("Failed to send pending notifications: {err:#}");
                }
            })
        },
    )
}
