//! Build graph snapshots and their refresh.
//!
//! A refresh asks the [`XcodeBuildClient`] for every scheme's index settings, derives
//! targets, per-file compiler options and the index store path, swaps the new
//! snapshot in and reports what changed relative to the previous one.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result};
use xcode_bsp_types::{BuildTarget, CompilerOptions, TargetUri};

use crate::arguments::{compiler_arguments, index_store_path, sanitize_arguments};
use crate::paths::{normalize_path, resolve_symlinks};
use crate::xcodebuild::{FileSettings, SettingsForIndex, XcodeBuildClient, XcodeBuildError};

/// Immutable view of the project's targets, files and compiler options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildGraphSnapshot {
    /// Sorted by uri.
    pub targets: Vec<BuildTarget>,
    pub files_by_target_uri: BTreeMap<String, Vec<String>>,
    pub options_by_target_uri: BTreeMap<String, BTreeMap<String, CompilerOptions>>,
    pub targets_by_file_path: BTreeMap<String, Vec<String>>,
    pub options_by_file_path: BTreeMap<String, CompilerOptions>,
    pub index_store_path: Option<String>,
}

impl BuildGraphSnapshot {
    /// Options for a file, preferring the given target's map (exact path, then
    /// symlink-resolved), then the global map.
    #[must_use]
    pub fn options_for(&self, file_path: &str, target_uri: Option<&str>) -> Option<&CompilerOptions> {
        self.options_resolving_with(file_path, target_uri, resolve_symlinks)
    }

    /// `resolve` only runs once the exact-path lookups have missed.
    fn options_resolving_with(
        &self,
        file_path: &str,
        target_uri: Option<&str>,
        resolve: impl Fn(&str) -> String,
    ) -> Option<&CompilerOptions> {
        let normalized = normalize_path(file_path);
        let by_target = target_uri.and_then(|uri| self.options_by_target_uri.get(uri));

        if let Some(options) = by_target.and_then(|by_file| by_file.get(&normalized)) {
            return Some(options);
        }
        if by_target.is_none()
            && let Some(options) = self.options_by_file_path.get(&normalized)
        {
            return Some(options);
        }

        let resolved = resolve(&normalized);
        by_target
            .and_then(|by_file| by_file.get(&resolved))
            .or_else(|| self.options_by_file_path.get(&normalized))
            .or_else(|| self.options_by_file_path.get(&resolved))
    }

    /// Targets containing a file (exact path, then symlink-resolved).
    #[must_use]
    pub fn targets_for(&self, file_path: &str) -> &[String] {
        let normalized = normalize_path(file_path);
        if let Some(targets) = self.targets_by_file_path.get(&normalized) {
            return targets;
        }
        self.targets_by_file_path
            .get(&resolve_symlinks(&normalized))
            .map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn target(&self, uri: &str) -> Option<&BuildTarget> {
        self.targets.iter().find(|target| target.uri == uri)
    }

    #[must_use]
    pub fn files_of(&self, target_uri: &str) -> &[String] {
        self.files_by_target_uri
            .get(target_uri)
            .map_or(&[], Vec::as_slice)
    }
}

/// A swapped-in snapshot and its differences from the one it replaced.
#[derive(Debug, Clone)]
pub struct BuildGraphRefresh {
    pub snapshot: Arc<BuildGraphSnapshot>,
    /// Sorted.
    pub changed_target_uris: Vec<String>,
    pub changed_options_by_file_path: BTreeMap<String, CompilerOptions>,
}

/// Owner of the current snapshot.
///
/// Refreshes are serialized; readers of the cached snapshot never wait for one.
pub struct BuildGraphService {
    client: Arc<dyn XcodeBuildClient>,
    project_name: String,
    active_schemes: Vec<String>,
    snapshot: Mutex<Option<Arc<BuildGraphSnapshot>>>,
    refresh_lock: tokio::sync::Mutex<()>,
}

impl BuildGraphService {
    pub fn new(
        client: Arc<dyn XcodeBuildClient>,
        project_name: impl Into<String>,
        active_schemes: Vec<String>,
    ) -> Self {
        Self {
            client,
            project_name: project_name.into(),
            active_schemes,
            snapshot: Mutex::new(None),
            refresh_lock: tokio::sync::Mutex::new(()),
        }
    }

    #[must_use]
    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    /// The cached snapshot, or the result of a cache-friendly refresh.
    pub async fn snapshot(&self) -> Result<Arc<BuildGraphSnapshot>> {
        if let Some(snapshot) = self.cached_snapshot() {
            tracing::trace!("build graph snapshot cache hit");
            return Ok(snapshot);
        }
        Ok(self.refresh(true).await?.snapshot)
    }

    #[must_use]
    pub fn cached_snapshot(&self) -> Option<Arc<BuildGraphSnapshot>> {
        self.slot().clone()
    }

    /// Drop the cached snapshot; the next [`snapshot`](Self::snapshot) rebuilds it.
    pub fn invalidate(&self) {
        *self.slot() = None;
    }

    pub async fn refresh(&self, check_cache: bool) -> Result<BuildGraphRefresh> {
        let _guard = self.refresh_lock.lock().await;

        let client = Arc::clone(&self.client);
        let project = self.project_name.clone();
        let active = self.active_schemes.clone();
        let snapshot = tokio::task::spawn_blocking(move || {
            build_snapshot(client.as_ref(), &project, &active, check_cache)
        })
        .await
        .context("Build graph refresh task failed")??;
        let snapshot = Arc::new(snapshot);

        let previous = self.slot().replace(Arc::clone(&snapshot));

        let changed_target_uris = changed_target_uris(previous.as_deref(), &snapshot);
        let changed_options_by_file_path = changed_options(previous.as_deref(), &snapshot);
        tracing::trace!(
            targets = snapshot.targets.len(),
            files = snapshot.options_by_file_path.len(),
            changed_targets = changed_target_uris.len(),
            changed_files = changed_options_by_file_path.len(),
            index_store = snapshot.index_store_path.as_deref().unwrap_or("none"),
            "build graph snapshot refreshed"
        );

        Ok(BuildGraphRefresh {
            snapshot,
            changed_target_uris,
            changed_options_by_file_path,
        })
    }

    pub async fn warmup_build(&self, scheme: &str) -> Result<()> {
        let client = Arc::clone(&self.client);
        let scheme = scheme.to_string();
        tokio::task::spawn_blocking(move || client.warmup_build(&scheme))
            .await
            .context("Warmup build task failed")??;
        Ok(())
    }

    fn slot(&self) -> MutexGuard<'_, Option<Arc<BuildGraphSnapshot>>> {
        self.snapshot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn build_snapshot(
    client: &dyn XcodeBuildClient,
    project: &str,
    active_schemes: &[String],
    check_cache: bool,
) -> Result<BuildGraphSnapshot, XcodeBuildError> {
    let schemes = resolve_schemes(client, active_schemes, check_cache)?;

    let mut targets = Vec::new();
    let mut files_by_target_uri: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut options_by_target_uri: BTreeMap<String, BTreeMap<String, CompilerOptions>> =
        BTreeMap::new();
    let mut targets_by_file: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    let mut index_store_candidates = Vec::new();

    for scheme in &schemes {
        let settings = settings_for_index(client, scheme, check_cache)?;
        let nested: Vec<&String> = settings
            .iter()
            .filter(|(name, files)| *name != scheme && !files.is_empty())
            .map(|(name, _)| name)
            .collect();

        let scheme_uri = TargetUri::for_scheme(project, scheme.as_str()).to_string();
        let nested_uris: Vec<(String, &String)> = nested
            .iter()
            .map(|name| {
                let uri = TargetUri::nested(project, scheme.as_str(), name.as_str());
                (uri.to_string(), *name)
            })
            .collect();

        targets.push(BuildTarget {
            uri: scheme_uri.clone(),
            display_name: scheme.clone(),
            dependencies: nested_uris.iter().map(|(uri, _)| uri.clone()).collect(),
        });
        let mut members = vec![(scheme_uri, None)];

        for (uri, name) in nested_uris {
            targets.push(BuildTarget {
                uri: uri.clone(),
                display_name: format!("{scheme} ({name})"),
                dependencies: Vec::new(),
            });
            members.push((uri, Some(name.as_str())));
        }

        for (uri, target) in members {
            let options = options_by_path(&settings, scheme, target);
            for (path, file_options) in &options {
                targets_by_file
                    .entry(path.clone())
                    .or_default()
                    .insert(uri.clone());
                if let Some(store) = index_store_path(&file_options.options) {
                    index_store_candidates.push(store);
                }
            }
            files_by_target_uri.insert(uri.clone(), options.keys().cloned().collect());
            options_by_target_uri.insert(uri, options);
        }
    }

    let mut options_by_file_path = BTreeMap::new();
    for by_file in options_by_target_uri.values() {
        for (path, options) in by_file {
            options_by_file_path
                .entry(path.clone())
                .or_insert_with(|| options.clone());
        }
    }

    let index_store_path = most_frequent(&index_store_candidates)
        .or_else(|| fallback_index_store_path(client, &schemes, check_cache));

    targets.sort_by(|a, b| a.uri.cmp(&b.uri));
    Ok(BuildGraphSnapshot {
        targets,
        files_by_target_uri,
        options_by_target_uri,
        targets_by_file_path: targets_by_file
            .into_iter()
            .map(|(path, uris)| (path, uris.into_iter().collect()))
            .collect(),
        options_by_file_path,
        index_store_path,
    })
}

fn resolve_schemes(
    client: &dyn XcodeBuildClient,
    active_schemes: &[String],
    check_cache: bool,
) -> Result<Vec<String>, XcodeBuildError> {
    if !active_schemes.is_empty() {
        return Ok(active_schemes.to_vec());
    }

    tracing::trace!("invoking xcodebuild list (check_cache={check_cache})");
    match client.list(check_cache) {
        Ok(list) if !check_cache || !list.schemes().is_empty() => Ok(list.schemes()),
        Err(e) if !check_cache => Err(e),
        cached => {
            if let Err(e) = cached {
                tracing::trace!("cached xcodebuild list failed ({e}); retrying uncached");
            }
            Ok(client.list(false)?.schemes())
        }
    }
}

fn settings_for_index(
    client: &dyn XcodeBuildClient,
    scheme: &str,
    check_cache: bool,
) -> Result<SettingsForIndex, XcodeBuildError> {
    tracing::trace!("invoking xcodebuild settingsForIndex {scheme} (check_cache={check_cache})");
    match client.settings_for_index(scheme, check_cache) {
        Ok(settings) if !check_cache || !settings.is_empty() => Ok(settings),
        Err(e) if !check_cache => Err(e),
        cached => {
            if let Err(e) = cached {
                tracing::trace!("cached settingsForIndex for {scheme} failed ({e}); retrying uncached");
            }
            client.settings_for_index(scheme, false)
        }
    }
}

/// File settings for a (scheme, target): the target's entry, the scheme's entry, the
/// only entry, or all entries merged.
fn file_settings<'a>(
    settings: &'a SettingsForIndex,
    scheme: &str,
    target: Option<&str>,
) -> BTreeMap<&'a str, &'a FileSettings> {
    let exact = target
        .into_iter()
        .chain(std::iter::once(scheme))
        .find_map(|key| settings.get(key).filter(|files| !files.is_empty()));
    let exact = exact.or_else(|| {
        if settings.len() == 1 {
            settings.values().next()
        } else {
            None
        }
    });

    match exact {
        Some(files) => files.iter().map(|(p, s)| (p.as_str(), s)).collect(),
        None => settings
            .values()
            .flat_map(|files| files.iter().map(|(p, s)| (p.as_str(), s)))
            .collect(),
    }
}

fn options_by_path(
    settings: &SettingsForIndex,
    scheme: &str,
    target: Option<&str>,
) -> BTreeMap<String, CompilerOptions> {
    file_settings(settings, scheme, target)
        .into_iter()
        .map(|(path, file)| {
            let arguments =
                sanitize_arguments(compiler_arguments(file), |p| Path::new(p).exists());
            (normalize_path(path), CompilerOptions::from_arguments(arguments))
        })
        .collect()
}

/// Most frequent value; ties go to the lexically smallest.
fn most_frequent(values: &[String]) -> Option<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for value in values {
        *counts.entry(value.as_str()).or_default() += 1;
    }
    counts
        .into_iter()
        .max_by(|(a, a_count), (b, b_count)| a_count.cmp(b_count).then_with(|| b.cmp(a)))
        .map(|(value, _)| value.to_string())
}

/// `<BUILD_ROOT>/../../Index.noindex/DataStore` of the first scheme with build settings.
fn fallback_index_store_path(
    client: &dyn XcodeBuildClient,
    schemes: &[String],
    check_cache: bool,
) -> Option<String> {
    for scheme in schemes {
        let settings = match client.settings_for_scheme(scheme, check_cache) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::debug!("no build settings for {scheme}: {e}");
                continue;
            }
        };
        let Some(build) = settings.iter().find(|s| s.action == "build") else {
            continue;
        };
        let Some(derived_data) = Path::new(&build.build_settings.build_root)
            .parent()
            .and_then(Path::parent)
        else {
            continue;
        };

        let path = derived_data.join("Index.noindex").join("DataStore");
        let path = normalize_path(&path.to_string_lossy());
        tracing::trace!("using index store path derived from BUILD_ROOT of {scheme}: {path}");
        return Some(path);
    }
    None
}

fn changed_target_uris(previous: Option<&BuildGraphSnapshot>, current: &BuildGraphSnapshot) -> Vec<String> {
    let Some(previous) = previous else {
        return current.targets.iter().map(|t| t.uri.clone()).collect();
    };

    let uris: BTreeSet<&str> = previous
        .targets
        .iter()
        .chain(&current.targets)
        .map(|t| t.uri.as_str())
        .collect();

    uris.into_iter()
        .filter(|uri| {
            previous.target(uri) != current.target(uri)
                || previous.files_by_target_uri.get(*uri) != current.files_by_target_uri.get(*uri)
        })
        .map(str::to_string)
        .collect()
}

/// Files whose options exist in `current` and differ from `previous`.
fn changed_options(
    previous: Option<&BuildGraphSnapshot>,
    current: &BuildGraphSnapshot,
) -> BTreeMap<String, CompilerOptions> {
    let Some(previous) = previous else {
        return current.options_by_file_path.clone();
    };

    current
        .options_by_file_path
        .iter()
        .filter(|(path, options)| previous.options_by_file_path.get(*path) != Some(*options))
        .map(|(path, options)| (path.clone(), options.clone()))
        .collect()
}
