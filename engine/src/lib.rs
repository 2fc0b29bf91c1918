//! Build-graph engine for xcode-bsp.
//!
//! Turns `xcodebuild` output into an immutable [`BuildGraphSnapshot`], keeps it fresh
//! without re-running `xcodebuild` on every request, and tracks the state shared by
//! request handlers: in-flight updates, registered documents and pending change
//! notifications.

mod arguments;
mod graph;
mod paths;
mod refresh;
mod state;
mod xcodebuild;

pub use arguments::{
    compiler_arguments, has_missing_module_map, index_store_path, sanitize_arguments,
};
pub use graph::{BuildGraphRefresh, BuildGraphService, BuildGraphSnapshot};
pub use paths::{normalize_path, resolve_symlinks};
pub use refresh::{BackgroundRefreshCoordinator, RefreshAction, RefreshTrigger};
pub use state::{BuildSystemState, PendingChanges};
pub use xcodebuild::{
    BuildSettings, FileSettings, ListedContainer, SchemeBuildSettings, SettingsForIndex,
    XcodeBuild, XcodeBuildClient, XcodeBuildError, XcodeList,
};
