//! `xcodebuild` invocation with a two-level (memory + disk) output cache.
//!
//! Cache files live in the cache directory and are named after the workspace:
//! `<dir>-<sha256(path)[..12]>-list.json` and, per scheme,
//! `…-<token>-settings.json` / `…-<token>-settingsForIndex.json`.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::{Mutex, PoisonError};

use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use xcode_bsp_utils::{atomic_write, sha256_hex};

const XCODEBUILD: &str = "xcodebuild";

#[derive(Debug, Error)]
pub enum XcodeBuildError {
    #[error("failed to run xcodebuild {args}: {source}")]
    Spawn {
        args: String,
        #[source]
        source: std::io::Error,
    },
    #[error("xcodebuild {args} failed ({status}): {stderr}")]
    Failed {
        args: String,
        status: String,
        stderr: String,
    },
    #[error("failed to decode xcodebuild {what} output: {source}")]
    Decode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Output of `xcodebuild -list -json`; projects and workspaces report under different keys.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct XcodeList {
    pub project: Option<ListedContainer>,
    pub workspace: Option<ListedContainer>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListedContainer {
    pub name: String,
    #[serde(default)]
    pub schemes: Vec<String>,
    #[serde(default)]
    pub targets: Vec<String>,
}

impl XcodeList {
    #[must_use]
    pub fn schemes(&self) -> Vec<String> {
        self.project
            .as_ref()
            .or(self.workspace.as_ref())
            .map(|container| container.schemes.clone())
            .unwrap_or_default()
    }
}

/// One entry of `xcodebuild -showBuildSettings -json`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemeBuildSettings {
    pub target: String,
    pub action: String,
    pub build_settings: BuildSettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BuildSettings {
    #[serde(rename = "BUILD_DIR", default)]
    pub build_dir: String,
    #[serde(rename = "BUILD_ROOT", default)]
    pub build_root: String,
    #[serde(rename = "PROJECT", default)]
    pub project: String,
    #[serde(rename = "SOURCE_ROOT", default)]
    pub source_root: String,
    #[serde(rename = "TARGET_NAME", default)]
    pub target_name: String,
}

/// Per-file entry of `-showBuildSettingsForIndex`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FileSettings {
    #[serde(rename = "swiftASTCommandArguments")]
    pub swift_ast_command_arguments: Option<Vec<String>>,
    #[serde(rename = "clangASTCommandArguments")]
    pub clang_ast_command_arguments: Option<Vec<String>>,
    #[serde(rename = "clangPCHCommandArguments")]
    pub clang_pch_command_arguments: Option<Vec<String>>,
}

/// Target name → file path → settings.
pub type SettingsForIndex = BTreeMap<String, BTreeMap<String, FileSettings>>;

/// Source of `xcodebuild` data for the build graph.
///
/// `check_cache = true` may answer from cached output; `false` always runs `xcodebuild`.
/// Calls block and are made from blocking threads.
pub trait XcodeBuildClient: Send + Sync {
    fn list(&self, check_cache: bool) -> Result<XcodeList, XcodeBuildError>;

    fn settings_for_index(
        &self,
        scheme: &str,
        check_cache: bool,
    ) -> Result<SettingsForIndex, XcodeBuildError>;

    fn settings_for_scheme(
        &self,
        scheme: &str,
        check_cache: bool,
    ) -> Result<Vec<SchemeBuildSettings>, XcodeBuildError>;

    /// Resolve packages and build `scheme` so generated module maps and headers exist.
    fn warmup_build(&self, scheme: &str) -> Result<(), XcodeBuildError>;
}

#[derive(Debug, Default)]
struct MemoryCache {
    list: Option<XcodeList>,
    settings: HashMap<String, Vec<SchemeBuildSettings>>,
    settings_for_index: HashMap<String, SettingsForIndex>,
}

/// [`XcodeBuildClient`] that shells out to `xcodebuild` in the workspace root.
pub struct XcodeBuild {
    workspace_root: PathBuf,
    cache_dir: PathBuf,
    cache_prefix: String,
    memory: Mutex<MemoryCache>,
}

impl XcodeBuild {
    #[must_use]
    pub fn new(workspace_root: impl Into<PathBuf>, cache_dir: impl Into<PathBuf>) -> Self {
        let workspace_root = workspace_root.into();
        let cache_prefix = cache_prefix(&workspace_root);
        Self {
            workspace_root,
            cache_dir: cache_dir.into(),
            cache_prefix,
            memory: Mutex::new(MemoryCache::default()),
        }
    }

    fn cache_file(&self, suffix: &str) -> PathBuf {
        self.cache_dir
            .join(format!("{}-{suffix}", self.cache_prefix))
    }

    fn list_cache_file(&self) -> PathBuf {
        self.cache_file("list.json")
    }

    fn settings_cache_file(&self, scheme: &str) -> PathBuf {
        self.cache_file(&format!("{}-settings.json", scheme_token(scheme)))
    }

    fn settings_for_index_cache_file(&self, scheme: &str) -> PathBuf {
        self.cache_file(&format!("{}-settingsForIndex.json", scheme_token(scheme)))
    }

    fn with_memory<T>(&self, f: impl FnOnce(&mut MemoryCache) -> T) -> T {
        let mut memory = self.memory.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut memory)
    }

    /// Cached output when allowed and present, otherwise a fresh run written back to disk.
    fn exec(
        &self,
        args: &[&str],
        cache_file: &Path,
        check_cache: bool,
    ) -> Result<Vec<u8>, XcodeBuildError> {
        if check_cache && let Some(cached) = read_cache(cache_file) {
            return Ok(cached);
        }

        let output = self.run(args)?;
        if let Err(e) = atomic_write(cache_file, &output) {
            tracing::warn!("Failed to write xcodebuild cache {}: {e}", cache_file.display());
        }
        Ok(output)
    }

    /// Run `xcodebuild -json <args>` and return stdout.
    fn run(&self, args: &[&str]) -> Result<Vec<u8>, XcodeBuildError> {
        let mut command = Command::new(XCODEBUILD);
        command.arg("-json").args(args);
        self.output(command, args)
    }

    fn output(&self, mut command: Command, args: &[&str]) -> Result<Vec<u8>, XcodeBuildError> {
        let rendered = args.join(" ");
        tracing::debug!("running xcodebuild {rendered}");

        let output = command
            .current_dir(&self.workspace_root)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| XcodeBuildError::Spawn {
                args: rendered.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(XcodeBuildError::Failed {
                args: rendered,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output.stdout)
    }

    /// Fetch and decode, retrying once uncached when cached output fails.
    fn fetch<T: DeserializeOwned>(
        &self,
        what: &'static str,
        args: &[&str],
        cache_file: &Path,
        check_cache: bool,
    ) -> Result<T, XcodeBuildError> {
        let attempt = self
            .exec(args, cache_file, check_cache)
            .and_then(|data| decode(what, &data));
        match attempt {
            Err(e) if check_cache => {
                tracing::debug!("cached xcodebuild {what} unusable ({e}); retrying uncached");
                let data = self.exec(args, cache_file, false)?;
                decode(what, &data)
            }
            other => other,
        }
    }
}

impl XcodeBuildClient for XcodeBuild {
    fn list(&self, check_cache: bool) -> Result<XcodeList, XcodeBuildError> {
        if check_cache && let Some(list) = self.with_memory(|m| m.list.clone()) {
            return Ok(list);
        }

        let list: XcodeList = self.fetch("list", &["-list"], &self.list_cache_file(), check_cache)?;
        self.with_memory(|m| m.list = Some(list.clone()));
        Ok(list)
    }

    fn settings_for_index(
        &self,
        scheme: &str,
        check_cache: bool,
    ) -> Result<SettingsForIndex, XcodeBuildError> {
        let cache_file = self.settings_for_index_cache_file(scheme);

        if check_cache {
            if let Some(settings) = self.with_memory(|m| m.settings_for_index.get(scheme).cloned())
            {
                return Ok(settings);
            }

            let cached = read_cache(&cache_file)
                .and_then(|data| serde_json::from_slice::<SettingsForIndex>(&data).ok());
            return Ok(match cached {
                Some(settings) => {
                    self.with_memory(|m| {
                        m.settings_for_index
                            .insert(scheme.to_string(), settings.clone());
                    });
                    settings
                }
                None => {
                    tracing::trace!("settingsForIndex cache miss for scheme {scheme}");
                    SettingsForIndex::new()
                }
            });
        }

        let data = self.exec(
            &["-showBuildSettingsForIndex", "-scheme", scheme],
            &cache_file,
            false,
        )?;
        let settings: SettingsForIndex = decode("settingsForIndex", &data)?;
        self.with_memory(|m| {
            m.settings_for_index
                .insert(scheme.to_string(), settings.clone());
        });
        Ok(settings)
    }

    fn settings_for_scheme(
        &self,
        scheme: &str,
        check_cache: bool,
    ) -> Result<Vec<SchemeBuildSettings>, XcodeBuildError> {
        if check_cache && let Some(settings) = self.with_memory(|m| m.settings.get(scheme).cloned())
        {
            return Ok(settings);
        }

        let settings: Vec<SchemeBuildSettings> = self.fetch(
            "showBuildSettings",
            &["-showBuildSettings", "-scheme", scheme],
            &self.settings_cache_file(scheme),
            check_cache,
        )?;
        self.with_memory(|m| {
            m.settings.insert(scheme.to_string(), settings.clone());
        });
        Ok(settings)
    }

    fn warmup_build(&self, scheme: &str) -> Result<(), XcodeBuildError> {
        let resolve = ["-scheme", scheme, "-resolvePackageDependencies"];
        let mut command = Command::new(XCODEBUILD);
        command.args(resolve).stdout(Stdio::null());
        if let Err(e) = self.output(command, &resolve) {
            tracing::debug!("package resolution before warmup failed: {e}");
        }

        let build = [
            "-scheme",
            scheme,
            "build",
            "CODE_SIGNING_ALLOWED=NO",
            "CODE_SIGNING_REQUIRED=NO",
        ];
        let mut command = Command::new(XCODEBUILD);
        command.args(build).stdout(Stdio::null());
        self.output(command, &build).map(drop)
    }
}

fn decode<T: DeserializeOwned>(what: &'static str, data: &[u8]) -> Result<T, XcodeBuildError> {
    serde_json::from_slice(data).map_err(|source| XcodeBuildError::Decode { what, source })
}

/// Non-empty contents of a cache file.
fn read_cache(path: &Path) -> Option<Vec<u8>> {
    std::fs::read(path).ok().filter(|data| !data.is_empty())
}

/// `<last component>-<first 12 hex chars of sha256(path)>`
fn cache_prefix(workspace_root: &Path) -> String {
    let path = workspace_root.to_string_lossy();
    let name = workspace_root
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("{name}-{}", &sha256_hex(path.as_bytes())[..12])
}

/// Scheme name made file-name safe, disambiguated by a short hash of the original.
fn scheme_token(scheme: &str) -> String {
    let normalized = scheme.replace([' ', '/'], "_");
    format!("{normalized}-{}", &sha256_hex(scheme.as_bytes())[..8])
}
