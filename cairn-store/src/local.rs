//! Local directory backend.
//!
//! ## `store` — atomic write protocol
//!
//! 1. Ensure the parent directory exists.
//! 2. Write to `<path>.cairn.tmp` in the same directory.
//! 3. `chmod 0644` (published documents are world-readable).
//! 4. Rename to the final path (atomic on POSIX).
//!
//! A failed rename removes the `.tmp` file and leaves the original intact.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::backend::DocumentStore;
use crate::error::{io_err, StoreError};

/// A directory tree laid out like the published bucket.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/<key>` — pure, no I/O.
    pub fn path_for(&self, key: &str) -> PathBuf {
        key.split('/')
            .filter(|part| !part.is_empty())
            .fold(self.root.clone(), |path, part| path.join(part))
    }
}

impl DocumentStore for LocalStore {
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let path = self.path_for(key);
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(io_err(path, err)),
        }
    }

    fn store(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let path = self.path_for(key);
        let tmp = tmp_path_for(&path);
        atomic_write(&path, bytes, &tmp)?;
        tracing::info!(path = %path.display(), bytes = bytes.len(), "stored document");
        Ok(())
    }

    fn locate(&self, key: &str) -> String {
        self.path_for(key).display().to_string()
    }
}

fn tmp_path_for(path: &Path) -> PathBuf {
    PathBuf::from(format!("{}.cairn.tmp", path.display()))
}

fn atomic_write(path: &Path, bytes: &[u8], tmp: &Path) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    if let Some(tmp_parent) = tmp.parent() {
        std::fs::create_dir_all(tmp_parent).map_err(|e| io_err(tmp_parent, e))?;
    }

    std::fs::write(tmp, bytes).map_err(|e| io_err(tmp, e))?;
    set_file_permissions(tmp)?;

    if let Err(e) = std::fs::rename(tmp, path) {
        let _ = std::fs::remove_file(tmp);
        return Err(io_err(path, e));
    }
    Ok(())
}

/// Published documents are world-readable (0644).
#[cfg(unix)]
pub(crate) fn set_file_permissions(path: &Path) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o644))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
pub(crate) fn set_file_permissions(_path: &Path) -> Result<(), StoreError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn missing_document_loads_as_none() {
        let root = TempDir::new().unwrap();
        let store = LocalStore::new(root.path());
        assert!(store.load("stable/releases.json").unwrap().is_none());
    }

    #[test]
    fn store_creates_parents_and_roundtrips() {
        let root = TempDir::new().unwrap();
        let store = LocalStore::new(root.path());
        store.store("stable/releases.json", b"{}").unwrap();
        assert_eq!(store.load("stable/releases.json").unwrap().as_deref(), Some(&b"{}"[..]));
    }

    #[test]
    fn tmp_file_removed_after_store() {
        let root = TempDir::new().unwrap();
        let store = LocalStore::new(root.path());
        store.store("stable/releases.json", b"{}").unwrap();
        let tmp = tmp_path_for(&store.path_for("stable/releases.json"));
        assert!(!tmp.exists(), ".cairn.tmp must be cleaned up");
    }

    #[test]
    #[cfg(unix)]
    fn stored_documents_are_world_readable() {
        use std::os::unix::fs::PermissionsExt;

        let root = TempDir::new().unwrap();
        let store = LocalStore::new(root.path());
        store.store("stable.json", b"{}").unwrap();
        let mode = fs::metadata(store.path_for("stable.json"))
            .unwrap()
            .permissions()
            .mode()
            & 0o777;
        assert_eq!(mode, 0o644);
    }

    #[test]
    fn path_for_ignores_empty_segments() {
        let store = LocalStore::new("/srv");
        assert_eq!(store.path_for("/stable//releases.json"), PathBuf::from("/srv/stable/releases.json"));
    }

    #[test]
    #[cfg(unix)]
    fn rename_failure_leaves_original_and_cleans_tmp() {
        use std::os::unix::fs::PermissionsExt;

        let root = TempDir::new().unwrap();
        let readonly_dir = root.path().join("readonly");
        fs::create_dir_all(&readonly_dir).unwrap();
        let path = readonly_dir.join("releases.json");
        fs::write(&path, "original").unwrap();

        let mut perms = fs::metadata(&readonly_dir).unwrap().permissions();
        perms.set_mode(0o555);
        fs::set_permissions(&readonly_dir, perms).unwrap();

        let tmp_dir = TempDir::new().unwrap();
        let tmp_path = tmp_dir.path().join("releases.json.cairn.tmp");
        let result = atomic_write(&path, b"new content", &tmp_path);

        let mut perms = fs::metadata(&readonly_dir).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&readonly_dir, perms).unwrap();

        // Root ignores directory permissions; only assert when the rename failed.
        if result.is_err() {
            assert_eq!(fs::read_to_string(&path).unwrap(), "original");
            assert!(!tmp_path.exists(), ".cairn.tmp should be cleaned up");
        }
    }
}
