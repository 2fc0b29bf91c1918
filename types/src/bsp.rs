//! Build Server Protocol payloads.
//!
//! Params are decoded from client requests, results and notifications are encoded back.
//! Field names follow the protocol's camelCase spelling.

use serde::{Deserialize, Serialize};

use crate::LANGUAGE_IDS;

pub const SERVER_DISPLAY_NAME: &str = "xcode-bsp";
pub const SERVER_VERSION: &str = "0.1.0";
pub const BSP_VERSION: &str = "2.0.0";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetIdentifier {
    pub uri: String,
}

impl TargetIdentifier {
    #[must_use]
    pub fn new(uri: impl Into<String>) -> Self {
        Self { uri: uri.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextDocumentIdentifier {
    pub uri: String,
}

// ============================================================================
// build/initialize
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeBuildResult {
    pub display_name: &'static str,
    pub version: &'static str,
    pub bsp_version: &'static str,
    pub capabilities: BuildServerCapabilities,
    pub data_kind: &'static str,
    pub data: SourceKitInitializeData,
}

impl InitializeBuildResult {
    #[must_use]
    pub fn new(data: SourceKitInitializeData) -> Self {
        Self {
            display_name: SERVER_DISPLAY_NAME,
            version: SERVER_VERSION,
            bsp_version: BSP_VERSION,
            capabilities: BuildServerCapabilities::default(),
            data_kind: "sourceKit",
            data,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildServerCapabilities {
    pub language_ids: Vec<&'static str>,
    pub build_target_changed_provider: bool,
    pub inverse_sources_provider: bool,
}

impl Default for BuildServerCapabilities {
    fn default() -> Self {
        Self {
            language_ids: LANGUAGE_IDS.to_vec(),
            build_target_changed_provider: true,
            inverse_sources_provider: true,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceKitInitializeData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_database_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_store_path: Option<String>,
    pub watches: Vec<FileSystemWatcher>,
    pub prepare_provider: bool,
    pub source_kit_options_provider: bool,
    pub wait_for_build_system_updates_provider: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSystemWatcher {
    pub glob_pattern: String,
}

// ============================================================================
// workspace/buildTargets
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct WorkspaceBuildTargetsResult {
    pub targets: Vec<BspBuildTarget>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BspBuildTarget {
    pub id: TargetIdentifier,
    pub display_name: String,
    pub tags: Vec<String>,
    pub language_ids: Vec<&'static str>,
    pub dependencies: Vec<TargetIdentifier>,
    pub capabilities: BuildTargetCapabilities,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildTargetCapabilities {
    pub can_compile: bool,
    pub can_test: bool,
    pub can_run: bool,
    pub can_debug: bool,
}

impl Default for BuildTargetCapabilities {
    fn default() -> Self {
        Self {
            can_compile: true,
            can_test: false,
            can_run: false,
            can_debug: false,
        }
    }
}

// ============================================================================
// buildTarget/sources, buildTarget/inverseSources, buildTarget/prepare
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct TargetsParams {
    pub targets: Vec<TargetIdentifier>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourcesResult {
    pub items: Vec<SourcesItem>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourcesItem {
    pub target: TargetIdentifier,
    pub sources: Vec<SourceItem>,
    pub roots: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceItem {
    pub uri: String,
    pub kind: SourceItemKind,
    pub generated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(into = "u8")]
pub enum SourceItemKind {
    File,
    Directory,
}

impl From<SourceItemKind> for u8 {
    fn from(kind: SourceItemKind) -> Self {
        match kind {
            SourceItemKind::File => 1,
            SourceItemKind::Directory => 2,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InverseSourcesParams {
    pub text_document: TextDocumentIdentifier,
}

#[derive(Debug, Clone, Serialize)]
pub struct InverseSourcesResult {
    pub targets: Vec<TargetIdentifier>,
}

// ============================================================================
// textDocument/registerForChanges, textDocument/sourceKitOptions
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterForChangesParams {
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub uri: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceKitOptionsParams {
    #[serde(default)]
    pub language: Option<String>,
    pub text_document: TextDocumentIdentifier,
    pub target: TargetIdentifier,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceKitOptionsResult {
    pub compiler_arguments: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<String>,
}

// ============================================================================
// workspace/didChangeWatchedFiles
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DidChangeWatchedFilesParams {
    #[serde(default)]
    pub changes: Vec<FileEvent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileEvent {
    pub uri: String,
    #[serde(rename = "type")]
    pub change_type: i32,
}

// ============================================================================
// Server -> client notifications
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct DidChangeBuildTargetParams {
    pub changes: Vec<BuildTargetEvent>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildTargetEvent {
    pub target: TargetIdentifier,
    pub kind: BuildTargetEventKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(into = "u8")]
pub enum BuildTargetEventKind {
    Created,
    Changed,
    Deleted,
}

impl From<BuildTargetEventKind> for u8 {
    fn from(kind: BuildTargetEventKind) -> Self {
        match kind {
            BuildTargetEventKind::Created => 1,
            BuildTargetEventKind::Changed => 2,
            BuildTargetEventKind::Deleted => 3,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceKitOptionsChangedParams {
    pub uri: String,
    pub updated_options: UpdatedOptions,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatedOptions {
    pub options: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<String>,
}
