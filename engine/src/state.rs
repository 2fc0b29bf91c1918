//! State shared by request handlers across the connection.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;
use xcode_bsp_types::CompilerOptions;

use crate::graph::BuildGraphRefresh;

/// Refresh results not yet announced to the client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingChanges {
    /// Sorted.
    pub changed_target_uris: Vec<String>,
    pub changed_options_by_file_path: BTreeMap<String, CompilerOptions>,
}

impl PendingChanges {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changed_target_uris.is_empty() && self.changed_options_by_file_path.is_empty()
    }
}

#[derive(Debug, Default)]
struct Inner {
    registered_uris: BTreeSet<String>,
    anonymous_registrations: usize,
    pending_updates: usize,
    changed_target_uris: BTreeSet<String>,
    changed_options_by_file_path: BTreeMap<String, CompilerOptions>,
    shutdown_received: bool,
}

/// Update depth, document registrations, pending notifications and the shutdown flag.
///
/// The lock is only held for field updates, never across an await.
#[derive(Debug, Default)]
pub struct BuildSystemState {
    inner: Mutex<Inner>,
    idle: Notify,
}

impl BuildSystemState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn begin_update(&self) {
        self.lock().pending_updates += 1;
    }

    /// Leave an update; the last one out wakes every idle waiter.
    pub fn end_update(&self) {
        let idle = {
            let mut inner = self.lock();
            inner.pending_updates = inner.pending_updates.saturating_sub(1);
            inner.pending_updates == 0
        };
        if idle {
            self.idle.notify_waiters();
        }
    }

    #[must_use]
    pub fn pending_updates(&self) -> usize {
        self.lock().pending_updates
    }

    /// Resolve once no update is in flight.
    pub async fn wait_for_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            // Register before checking so a concurrent `end_update` cannot be missed.
            notified.as_mut().enable();
            if self.lock().pending_updates == 0 {
                return;
            }
            notified.await;
        }
    }

    /// `unregister` (any case) removes; anything else registers. Without a uri the
    /// anonymous count is adjusted instead.
    pub fn update_registration(&self, action: Option<&str>, uri: Option<&str>) {
        let unregister = action.is_some_and(|a| a.eq_ignore_ascii_case("unregister"));
        let mut inner = self.lock();
        match (unregister, uri) {
            (true, Some(uri)) => {
                inner.registered_uris.remove(uri);
            }
            (true, None) => {
                inner.anonymous_registrations = inner.anonymous_registrations.saturating_sub(1);
            }
            (false, Some(uri)) => {
                inner.registered_uris.insert(uri.to_string());
            }
            (false, None) => inner.anonymous_registrations += 1,
        }
    }

    #[must_use]
    pub fn has_registered_documents(&self) -> bool {
        let inner = self.lock();
        !inner.registered_uris.is_empty() || inner.anonymous_registrations > 0
    }

    /// Sorted.
    #[must_use]
    pub fn registered_document_uris(&self) -> Vec<String> {
        self.lock().registered_uris.iter().cloned().collect()
    }

    /// Accumulate a refresh's changes; later options for a path replace earlier ones.
    pub fn record_refresh_changes(&self, refresh: &BuildGraphRefresh) {
        let mut inner = self.lock();
        inner
            .changed_target_uris
            .extend(refresh.changed_target_uris.iter().cloned());
        for (path, options) in &refresh.changed_options_by_file_path {
            inner
                .changed_options_by_file_path
                .insert(path.clone(), options.clone());
        }
    }

    /// Take and clear the accumulated changes.
    pub fn drain_pending_changes(&self) -> PendingChanges {
        let mut inner = self.lock();
        PendingChanges {
            changed_target_uris: std::mem::take(&mut inner.changed_target_uris)
                .into_iter()
                .collect(),
            changed_options_by_file_path: std::mem::take(&mut inner.changed_options_by_file_path),
        }
    }

    pub fn mark_shutdown_received(&self) {
        self.lock().shutdown_received = true;
    }

    #[must_use]
    pub fn has_received_shutdown(&self) -> bool {
        self.lock().shutdown_received
    }
}
