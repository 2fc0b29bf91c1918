use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::form_urlencoded;

const URI_PREFIX: &str = "xcode://";

/// Identity of a build target: `xcode://<project>?scheme=<scheme>[&target=<target>]`.
///
/// A scheme target has no nested-target component and lists its nested targets as
/// dependencies. Two targets are the same entity iff their rendered URIs are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetUri {
    project: String,
    scheme: String,
    target: Option<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TargetUriError {
    #[error("target uri does not use the xcode:// scheme: {0}")]
    UnexpectedScheme(String),
    #[error("target uri has no scheme query item: {0}")]
    MissingScheme(String),
}

impl TargetUri {
    /// Top-level target for a scheme.
    #[must_use]
    pub fn for_scheme(project: impl Into<String>, scheme: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            scheme: scheme.into(),
            target: None,
        }
    }

    /// Nested target inside a scheme. An empty target name yields the scheme target.
    #[must_use]
    pub fn nested(
        project: impl Into<String>,
        scheme: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        let target = target.into();
        Self {
            project: project.into(),
            scheme: scheme.into(),
            target: (!target.is_empty()).then_some(target),
        }
    }

    pub fn parse(uri: &str) -> Result<Self, TargetUriError> {
        let rest = uri
            .strip_prefix(URI_PREFIX)
            .ok_or_else(|| TargetUriError::UnexpectedScheme(uri.to_string()))?;
        let (project, query) = rest.split_once('?').unwrap_or((rest, ""));

        let mut scheme = None;
        let mut target = None;
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "scheme" if scheme.is_none() => scheme = Some(value.into_owned()),
                "target" if target.is_none() => target = Some(value.into_owned()),
                _ => {}
            }
        }

        let scheme = scheme.ok_or_else(|| TargetUriError::MissingScheme(uri.to_string()))?;
        Ok(Self {
            project: project.to_string(),
            scheme,
            target: target.filter(|t| !t.is_empty()),
        })
    }

    #[must_use]
    pub fn project(&self) -> &str {
        &self.project
    }

    #[must_use]
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    #[must_use]
    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    /// Key under which prepared compiler arguments are persisted: `scheme` or `scheme::target`.
    #[must_use]
    pub fn cache_scope(&self) -> String {
        match &self.target {
            Some(target) => format!("{}::{target}", self.scheme),
            None => self.scheme.clone(),
        }
    }

    /// Same target re-rooted under another project name.
    #[must_use]
    pub fn with_project(&self, project: &str) -> Self {
        Self {
            project: project.to_string(),
            ..self.clone()
        }
    }
}

impl fmt::Display for TargetUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut query = form_urlencoded::Serializer::new(String::new());
        query.append_pair("scheme", &self.scheme);
        if let Some(target) = &self.target {
            query.append_pair("target", target);
        }
        write!(f, "{URI_PREFIX}{}?{}", self.project, query.finish())
    }
}

/// Project name used in target URIs: the last component of the workspace directory.
#[must_use]
pub fn project_name_for(workspace_root: &Path) -> String {
    workspace_root
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// A node of the build graph as reported to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildTarget {
    pub uri: String,
    pub display_name: String,
    pub dependencies: Vec<String>,
}
