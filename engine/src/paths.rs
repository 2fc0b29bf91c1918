use std::path::{Component, Path, PathBuf};

/// Lexically normalize a path: drop `.` components and fold `..` into its parent.
///
/// `..` above the root stays at the root; leading `..` of a relative path is kept.
#[must_use]
pub fn normalize_path(path: &str) -> String {
    let mut out = PathBuf::new();
    for component in Path::new(path).components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }

    if out.as_os_str().is_empty() {
        return ".".to_string();
    }
    out.to_string_lossy().into_owned()
}

/// Path with symlinks resolved, or the input unchanged when it cannot be resolved.
#[must_use]
pub fn resolve_symlinks(path: &str) -> String {
    std::fs::canonicalize(path)
        .map(|resolved| resolved.to_string_lossy().into_owned())
        .unwrap_or_else(|_| path.to_string())
}
