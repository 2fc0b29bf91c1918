use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::ConfigError;

/// Overrides the cache directory.
pub const CACHE_DIR_ENV: &str = "XCODE_BSP_CACHE_DIR";
/// Enables `build/sourceKitOptionsChanged` notifications when set to `1` or `true`.
pub const LEGACY_OPTIONS_CHANGED_ENV: &str = "XCODE_BSP_LEGACY_OPTIONS_CHANGED";

/// Per-user server settings.
///
/// ```toml
/// [log]
/// filter = "xcode_bsp=debug"
///
/// [cache]
/// dir = "/tmp/xcode-bsp"
///
/// [notifications]
/// source_kit_options_changed = true
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct ServerSettings {
    pub log: Option<LogSettings>,
    pub cache: Option<CacheSettings>,
    pub notifications: Option<NotificationSettings>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LogSettings {
    /// `tracing_subscriber::EnvFilter` directives, used when `RUST_LOG` is unset.
    pub filter: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CacheSettings {
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
pub struct NotificationSettings {
    #[serde(default)]
    pub source_kit_options_changed: bool,
}

impl ServerSettings {
    pub fn load() -> Result<Option<Self>, ConfigError> {
        match settings_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(None),
        }
    }

    /// `Ok(None)` when the file does not exist.
    pub fn load_from(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read settings at {:?}: {}", path, err);
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        match toml::from_str(&content) {
            Ok(settings) => Ok(Some(settings)),
            Err(err) => {
                tracing::warn!("Failed to parse settings at {:?}: {}", path, err);
                Err(ConfigError::ParseToml {
                    path: path.to_path_buf(),
                    source: err,
                })
            }
        }
    }

    #[must_use]
    pub fn log_filter(&self) -> Option<&str> {
        self.log.as_ref().and_then(|log| log.filter.as_deref())
    }

    /// Cache directory: `XCODE_BSP_CACHE_DIR`, then `[cache] dir`, then the platform default.
    #[must_use]
    pub fn cache_dir(&self) -> Option<PathBuf> {
        self.cache_dir_with(std::env::var_os(CACHE_DIR_ENV).map(PathBuf::from))
    }

    fn cache_dir_with(&self, env_override: Option<PathBuf>) -> Option<PathBuf> {
        env_override
            .filter(|dir| !dir.as_os_str().is_empty())
            .or_else(|| self.cache.as_ref().and_then(|cache| cache.dir.clone()))
            .or_else(default_cache_dir)
    }

    /// Whether to send `build/sourceKitOptionsChanged` after refreshes.
    #[must_use]
    pub fn source_kit_options_changed(&self) -> bool {
        self.source_kit_options_changed_with(std::env::var(LEGACY_OPTIONS_CHANGED_ENV).ok())
    }

    fn source_kit_options_changed_with(&self, env_value: Option<String>) -> bool {
        if let Some(value) = env_value {
            return matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
        self.notifications
            .as_ref()
            .is_some_and(|n| n.source_kit_options_changed)
    }
}

/// `~/.xcode-bsp/config.toml`
#[must_use]
pub fn settings_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".xcode-bsp").join("config.toml"))
}

/// `~/Library/Caches/xcode-bsp` on macOS, the XDG cache dir elsewhere.
#[must_use]
pub fn default_cache_dir() -> Option<PathBuf> {
    dirs::cache_dir().map(|dir| dir.join("xcode-bsp"))
}
