//! Configuration for xcode-bsp.
//!
//! Two sources: the per-project `.bsp/xcode-bsp.json` written when a project is set up,
//! and the optional per-user `~/.xcode-bsp/config.toml` holding server settings.

mod project;
mod settings;

use std::path::PathBuf;

pub use project::{BSP_DIR_NAME, CONFIG_FILE_NAME, ProjectConfig};
pub use settings::{
    CACHE_DIR_ENV, CacheSettings, LEGACY_OPTIONS_CHANGED_ENV, LogSettings, NotificationSettings,
    ServerSettings, default_cache_dir, settings_path,
};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", path.display())]
    ParseJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to parse {}: {source}", path.display())]
    ParseToml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl ConfigError {
    #[must_use]
    pub fn path(&self) -> &PathBuf {
        match self {
            ConfigError::Read { path, .. }
            | ConfigError::ParseJson { path, .. }
            | ConfigError::ParseToml { path, .. } => path,
        }
    }
}
