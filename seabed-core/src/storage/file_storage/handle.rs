//! Per-torrent cache of open file handles.
//!
//! Each physical path gets at most one open handle for the lifetime of the
//! owning torrent store. I/O on a handle is serialized by its own async
//! mutex; the path-to-handle map has a separate short-lived lock so that a
//! cache lookup never waits behind another file's I/O.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::fs::{File, OpenOptions};
use tokio::sync::{Mutex, MutexGuard};
use tracing::warn;

use crate::storage::StorageError;

/// One open file, serialized by its own lock.
///
/// Handles are created on first access and stay open until the owning cache
/// is closed; they are never closed individually.
#[derive(Debug)]
pub(super) struct FileHandle {
    path: PathBuf,
    file: Mutex<File>,
}

impl FileHandle {
    /// Returns the absolute path this handle is bound to.
    pub(super) fn path(&self) -> &Path {
        &self.path
    }

    /// Acquires exclusive access to the underlying file.
    ///
    /// Hold the guard only for a single file-local operation; never across
    /// work on another file.
    pub(super) async fn lock(&self) -> MutexGuard<'_, File> {
        self.file.lock().await
    }
}

/// Maps absolute paths to their single open handle.
#[derive(Debug, Default)]
pub(super) struct HandleCache {
    handles: RwLock<HashMap<PathBuf, Arc<FileHandle>>>,
}

impl HandleCache {
    pub(super) fn new() -> Self {
        Self::default()
    }

    /// Returns the cached handle for `path`, opening it on first access.
    ///
    /// With `creatable` unset, a path missing from disk yields
    /// `StorageError::EndOfData`: nothing was ever written there, which
    /// readers treat as all-zero rather than as a failure. With `creatable`
    /// set, parent directories are created as needed and the file is opened
    /// for random-access read/write, created if absent.
    pub(super) async fn open(
        &self,
        path: &Path,
        creatable: bool,
    ) -> Result<Arc<FileHandle>, StorageError> {
        if let Some(handle) = self.handles.read().get(path) {
            return Ok(handle.clone());
        }

        match tokio::fs::metadata(path).await {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                if !creatable {
                    return Err(StorageError::EndOfData);
                }
            }
            Err(e) => return Err(e.into()),
        }

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .await?;

        let handle = Arc::new(FileHandle {
            path: path.to_owned(),
            file: Mutex::new(file),
        });

        // Two tasks can race past the read-lock miss; the map keeps whichever
        // handle lands first and both callers share it.
        let mut handles = self.handles.write();
        Ok(handles.entry(path.to_owned()).or_insert(handle).clone())
    }

    /// Flushes and releases every cached handle.
    ///
    /// All handles are attempted even when one fails; the first error
    /// observed is returned after the full sweep so a single bad file cannot
    /// leak the remaining handles.
    pub(super) async fn close_all(&self) -> Result<(), StorageError> {
        let drained: Vec<Arc<FileHandle>> = self.handles.write().drain().map(|(_, h)| h).collect();

        let mut first_error = None;
        for handle in drained {
            let file = handle.lock().await;
            if let Err(e) = file.sync_all().await {
                warn!(path = %handle.path().display(), error = %e, "failed to flush file handle");
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    #[cfg(test)]
    pub(super) fn len(&self) -> usize {
        self.handles.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_without_create_is_end_of_data() {
        let temp_dir = tempfile::tempdir().unwrap();
        let cache = HandleCache::new();

        let result = cache.open(&temp_dir.path().join("absent.bin"), false).await;
        assert!(matches!(result, Err(StorageError::EndOfData)));
        assert_eq!(cache.len(), 0);
    }

    #[tokio::test]
    async fn test_creatable_open_builds_directories() {
        let temp_dir = tempfile::tempdir().unwrap();
        let cache = HandleCache::new();
        let path = temp_dir.path().join("deep/nested/file.bin");

        let handle = cache.open(&path, true).await.unwrap();
        assert_eq!(handle.path(), path);
        assert!(path.is_file());
    }

    #[tokio::test]
    async fn test_same_path_reuses_one_handle() {
        let temp_dir = tempfile::tempdir().unwrap();
        let cache = HandleCache::new();
        let path = temp_dir.path().join("shared.bin");

        let first = cache.open(&path, true).await.unwrap();
        // A read-only open of an existing path must hit the cache, not disk.
        let second = cache.open(&path, false).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_close_all_empties_the_cache() {
        let temp_dir = tempfile::tempdir().unwrap();
        let cache = HandleCache::new();

        cache.open(&temp_dir.path().join("a.bin"), true).await.unwrap();
        cache.open(&temp_dir.path().join("b.bin"), true).await.unwrap();
        assert_eq!(cache.len(), 2);

        cache.close_all().await.unwrap();
        assert_eq!(cache.len(), 0);
    }
}
