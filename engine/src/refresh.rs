//! Coalesced background refreshes requested by handlers.
//!
//! A request counts as a pending update from the moment it is accepted, so
//! `waitForBuildSystemUpdates` arriving right after it waits for the refresh.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::state::BuildSystemState;

/// Refresh work run in the background; receives the reason it was requested for.
pub type RefreshAction =
    Arc<dyn Fn(String) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Something handlers can ask for a background refresh.
pub trait RefreshTrigger: Send + Sync {
    fn request_refresh(&self, reason: &str);
}

/// Runs at most one background refresh at a time.
///
/// Requests arriving while one is in flight are dropped, not queued; the running
/// refresh already holds the update depth above zero.
pub struct BackgroundRefreshCoordinator {
    state: Arc<BuildSystemState>,
    action: RefreshAction,
    in_flight: Arc<AtomicBool>,
}

/// Ends the accepted update when the refresh task ends, including by panic.
struct InFlight {
    flag: Arc<AtomicBool>,
    state: Arc<BuildSystemState>,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
        self.state.end_update();
    }
}

impl BackgroundRefreshCoordinator {
    pub fn new(state: Arc<BuildSystemState>, action: RefreshAction) -> Self {
        Self {
            state,
            action,
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    #[must_use]
    pub fn is_refreshing(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }
}

impl RefreshTrigger for BackgroundRefreshCoordinator {
    fn request_refresh(&self, reason: &str) {
        if self.in_flight.swap(true, Ordering::AcqRel) {
            tracing::trace!("background refresh coalesced; already in flight (reason={reason})");
            return;
        }

        // Raised before spawning: a waiter dispatched after this call must see it.
        self.state.begin_update();
        let guard = InFlight {
            flag: Arc::clone(&self.in_flight),
            state: Arc::clone(&self.state),
        };
        tracing::trace!("background refresh scheduled (reason={reason})");
        let action = Arc::clone(&self.action);
        let reason = reason.to_string();
        tokio::spawn(async move {
            let _guard = guard;
            tracing::trace!("background refresh started (reason={reason})");
            action(reason.clone()).await;
            tracing::trace!("background refresh finished (reason={reason})");
        });
    }
}
