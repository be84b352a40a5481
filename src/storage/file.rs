// SPDX-License-Identifier: PMPL-1.0-or-later

//! Directory-backed store: one `<key>.json` file per key.

use super::{validate_key, KeyValueStore, StorageError, StorageResult};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// The directory is created lazily on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> StorageResult<PathBuf> {
        validate_key(key)?;
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

fn io_error(path: &Path, source: io::Error) -> StorageError {
    StorageError::Io {
        path: path.to_path_buf(),
        source,
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(io_error(&path, err)),
        }
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.dir).map_err(|e| io_error(&self.dir, e))?;

        // Write to a sibling temp file then rename so readers never see a
        // half-written document.
        let tmp_path = self.dir.join(format!("{}.json.tmp", key));
        if let Err(err) = fs::write(&tmp_path, value.as_bytes()) {
            let _ = fs::remove_file(&tmp_path);
            if err.kind() == io::ErrorKind::StorageFull {
                return Err(StorageError::QuotaExceeded {
                    needed: value.len(),
                    quota: 0,
                });
            }
            return Err(io_error(&tmp_path, err));
        }
        fs::rename(&tmp_path, &path).map_err(|e| io_error(&path, e))?;

        tracing::debug!(path = %path.display(), bytes = value.len(), "stored");
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(io_error(&path, err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn set_then_get_round_trips_through_disk() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path().join("nested"));

        assert_eq!(store.get("prefs").unwrap(), None);
        store.set("prefs", "\"sr\"").unwrap();
        assert_eq!(store.get("prefs").unwrap().as_deref(), Some("\"sr\""));
        assert!(dir.path().join("nested/prefs.json").is_file());
        assert!(!dir.path().join("nested/prefs.json.tmp").exists());
    }

    #[test]
    fn remove_missing_key_is_ok() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());
        store.remove("absent").unwrap();
        store.set("present", "1").unwrap();
        store.remove("present").unwrap();
        assert_eq!(store.get("present").unwrap(), None);
    }

    #[test]
    fn rejects_path_like_keys() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());
        assert!(matches!(
            store.set("../escape", "x"),
            Err(StorageError::InvalidKey(_))
        ));
    }
}
