use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::ConfigError;

pub const BSP_DIR_NAME: &str = ".bsp";
pub const CONFIG_FILE_NAME: &str = "xcode-bsp.json";

/// Connection file read by the client to launch the server, plus the scheme selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    pub name: String,
    pub argv: Vec<String>,
    pub version: String,
    pub bsp_version: String,
    pub languages: Vec<String>,
    /// Schemes to index; empty means every scheme `xcodebuild -list` reports.
    #[serde(default)]
    pub active_schemes: Vec<String>,
}

impl ProjectConfig {
    /// `<root>/.bsp/xcode-bsp.json`
    #[must_use]
    pub fn path(root: &Path) -> PathBuf {
        root.join(BSP_DIR_NAME).join(CONFIG_FILE_NAME)
    }

    /// Load the project config under `root`. Unlike server settings it is required.
    pub fn load(root: &Path) -> Result<Self, ConfigError> {
        let path = Self::path(root);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read project config at {:?}: {}", path, err);
                return Err(ConfigError::Read { path, source: err });
            }
        };

        Self::parse(&content).map_err(|source| {
            tracing::warn!("Failed to parse project config at {:?}: {}", path, source);
            ConfigError::ParseJson { path, source }
        })
    }

    pub fn parse(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }
}
