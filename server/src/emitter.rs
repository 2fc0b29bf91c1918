//! Announces accumulated refresh changes to the client.

use std::sync::Arc;

use anyhow::Result;
use xcode_bsp_engine::{BuildSystemState, normalize_path, resolve_symlinks};
use xcode_bsp_rpc::{MessageWriter, Notification, file_uri_to_path};
use xcode_bsp_types::bsp::{
    BuildTargetEvent, BuildTargetEventKind, DidChangeBuildTargetParams,
    SourceKitOptionsChangedParams, TargetIdentifier, UpdatedOptions,
};

pub const DID_CHANGE_BUILD_TARGET: &str = "buildTarget/didChange";
pub const SOURCE_KIT_OPTIONS_CHANGED: &str = "build/sourceKitOptionsChanged";

pub struct PendingNotificationsEmitter {
    writer: Arc<MessageWriter>,
    state: Arc<BuildSystemState>,
    source_kit_options_changed: bool,
}

impl PendingNotificationsEmitter {
    pub fn new(
        writer: Arc<MessageWriter>,
        state: Arc<BuildSystemState>,
        source_kit_options_changed: bool,
    ) -> Self {
        Self {
            writer,
            state,
            source_kit_options_changed,
        }
    }

    /// Drain pending changes and send the matching notifications.
    ///
    /// `buildTarget/didChange` goes out for any changed target. Per-document
    /// `build/sourceKitOptionsChanged` is only sent when enabled and only for
    /// registered `file://` documents whose options changed.
    pub async fn emit(&self) -> Result<()> {
        let pending = self.state.drain_pending_changes();

        if !pending.changed_target_uris.is_empty() {
            let changes = pending
                .changed_target_uris
                .iter()
                .map(|uri| BuildTargetEvent {
                    target: TargetIdentifier::new(uri.as_str()),
                    kind: BuildTargetEventKind::Changed,
                })
                .collect();
            tracing::debug!(
                "sending {DID_CHANGE_BUILD_TARGET} for {} targets",
                pending.changed_target_uris.len()
            );
            self.writer
                .send(&Notification::new(
                    DID_CHANGE_BUILD_TARGET,
                    Some(DidChangeBuildTargetParams { changes }),
                ))
                .await?;
        }

        if !self.source_kit_options_changed || !self.state.has_registered_documents() {
            return Ok(());
        }

        for uri in self.state.registered_document_uris() {
            let Some(path) = file_uri_to_path(&uri) else {
                continue;
            };
            let path = normalize_path(&path.to_string_lossy());
            let options = pending
                .changed_options_by_file_path
                .get(&path)
                .or_else(|| {
                    pending
                        .changed_options_by_file_path
                        .get(&resolve_symlinks(&path))
                });
            let Some(options) = options else {
                continue;
            };

            self.writer
                .send(&Notification::new(
                    SOURCE_KIT_OPTIONS_CHANGED,
                    Some(SourceKitOptionsChangedParams {
                        uri,
                        updated_options: UpdatedOptions {
                            options: options.options.clone(),
                            working_directory: options.working_directory.clone(),
                        },
                    }),
                ))
                .await?;
        }
        Ok(())
    }
}
