//! Crash-safe replacement of cache files.
//!
//! The bytes land in a temp file beside the target which is then renamed over it, so a
//! reader sees either the old cache entry or the new one, never a torn write.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;

/// Replace `path` with `bytes`, creating missing parent directories.
pub fn atomic_write(path: impl AsRef<Path>, bytes: &[u8]) -> io::Result<()> {
    let path = path.as_ref();
    let dir = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    fs::create_dir_all(dir)?;

    let mut staged = NamedTempFile::new_in(dir)?;
    staged.write_all(bytes)?;
    staged.as_file().sync_data()?;

    if let Err(err) = staged.persist(path) {
        tracing::debug!("Rename into {} failed: {}", path.display(), err.error);
        return Err(err.error);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::atomic_write;

    #[test]
    fn replaces_previous_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("list-abc.json");

        atomic_write(&path, br#"{"project":{}}"#).unwrap();
        atomic_write(&path, br#"{"workspace":{}}"#).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), r#"{"workspace":{}}"#);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn creates_missing_cache_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("xcodebuild").join("settings-App.json");

        atomic_write(&path, b"{}").unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"{}");
    }
}
