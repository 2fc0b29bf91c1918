//! Which watched-file changes can affect the build graph.

use std::path::Path;

use globset::{Glob, GlobBuilder, GlobSet, GlobSetBuilder};
use xcode_bsp_engine::normalize_path;
use xcode_bsp_rpc::file_uri_to_path;

/// Build products and caches; changes below these never matter.
const EXCLUDED_DIRECTORIES: [&str; 4] = [
    "**/.build/**",
    "**/deriveddata/**",
    "**/modulecache/**",
    "**/index.noindex/**",
];

const RELEVANT_EXTENSIONS: [&str; 22] = [
    "swift",
    "h",
    "hh",
    "hpp",
    "m",
    "mm",
    "c",
    "cc",
    "cpp",
    "cxx",
    "pch",
    "modulemap",
    "metal",
    "swiftinterface",
    "swiftmodule",
    "swiftpm",
    "xcodeproj",
    "pbxproj",
    "xcscheme",
    "xcconfig",
    "plist",
    "resolved",
];

/// Patterns announced to the client in `build/initialize`.
pub const WATCHED_GLOBS: [&str; 8] = [
    "**/*.swift",
    "**/*.h",
    "**/*.m",
    "**/*.mm",
    "**/*.c",
    "**/*.cpp",
    "**/*.xcodeproj/project.pbxproj",
    ".bsp/xcode-bsp.json",
];

#[derive(Debug, Clone)]
pub struct WatchFilter {
    excluded: GlobSet,
    extensions: GlobSet,
}

impl WatchFilter {
    pub fn new() -> Result<Self, globset::Error> {
        let mut excluded = GlobSetBuilder::new();
        for pattern in EXCLUDED_DIRECTORIES {
            excluded.add(case_insensitive(pattern)?);
        }

        let mut extensions = GlobSetBuilder::new();
        extensions.add(case_insensitive(&format!(
            "*.{{{}}}",
            RELEVANT_EXTENSIONS.join(",")
        ))?);

        Ok(Self {
            excluded: excluded.build()?,
            extensions: extensions.build()?,
        })
    }

    /// Non-file URIs and extension-less paths count as relevant.
    #[must_use]
    pub fn is_relevant(&self, uri: &str) -> bool {
        let Some(path) = file_uri_to_path(uri) else {
            return true;
        };
        let path = normalize_path(&path.to_string_lossy());
        if self.excluded.is_match(&path) {
            return false;
        }

        let path = Path::new(&path);
        if path.extension().is_none() {
            return true;
        }
        path.file_name()
            .is_some_and(|name| self.extensions.is_match(name))
    }

    #[must_use]
    pub fn has_relevant_change<'a>(&self, uris: impl IntoIterator<Item = &'a str>) -> bool {
        uris.into_iter().any(|uri| self.is_relevant(uri))
    }
}

fn case_insensitive(pattern: &str) -> Result<Glob, globset::Error> {
    GlobBuilder::new(pattern).case_insensitive(true).build()
}
