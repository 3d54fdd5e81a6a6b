//! File-backed storage implementation.
//!
//! Torrent payload lands in real files at their natural paths under a
//! storage root derived from the configured layout. The factory here is
//! configuration-only; all I/O happens when a torrent is opened or when
//! pieces are read and written through [`FileTorrent`].

mod handle;
mod torrent;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::fs::{self, OpenOptions};
pub use torrent::FileTorrent;

use super::completion::{JsonPieceCompletion, MemoryPieceCompletion, PieceCompletion};
use super::{StorageBackend, StorageError, TorrentStore};
use crate::config::StorageConfig;
use crate::torrent::{InfoHash, TorrentFile, TorrentInfo};

/// Policy deriving a torrent's storage root from the base directory.
///
/// The layout is a pure mapping; it performs no I/O and never depends on
/// what is already on disk.
#[derive(Clone, Copy, Default)]
pub enum PathLayout {
    /// All torrents share the base directory
    #[default]
    Flat,
    /// Each torrent lives under `base/<hex info hash>`
    PerInfoHash,
    /// Caller-provided mapping
    Custom(fn(&Path, &TorrentInfo, InfoHash) -> PathBuf),
}

impl PathLayout {
    /// Resolves the storage root for one torrent.
    pub fn resolve(&self, base_dir: &Path, info: &TorrentInfo, info_hash: InfoHash) -> PathBuf {
        match self {
            PathLayout::Flat => base_dir.to_path_buf(),
            PathLayout::PerInfoHash => base_dir.join(info_hash.to_string()),
            PathLayout::Custom(resolve) => resolve(base_dir, info, info_hash),
        }
    }
}

impl std::fmt::Debug for PathLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathLayout::Flat => f.write_str("Flat"),
            PathLayout::PerInfoHash => f.write_str("PerInfoHash"),
            PathLayout::Custom(_) => f.write_str("Custom"),
        }
    }
}

/// Absolute path of one file entry: `root/<torrent name>/<segments...>`.
pub(super) fn entry_path(root: &Path, torrent_name: &str, file: &TorrentFile) -> PathBuf {
    let mut path = root.join(torrent_name);
    for segment in &file.path {
        path.push(segment);
    }
    path
}

/// Creates on-disk placeholders for every zero-length file entry.
///
/// Zero-length files own no piece bytes, so piece-addressed writes can never
/// bring them into existence; they are materialized once when the torrent is
/// opened. Idempotent: existing files are left untouched. Stops at the first
/// error; files already created stay in place.
///
/// # Errors
///
/// - `StorageError::Io` - If a directory or placeholder cannot be created
pub async fn create_zero_length_files(
    info: &TorrentInfo,
    root: &Path,
) -> Result<(), StorageError> {
    for file in info.files.iter().filter(|f| f.length == 0) {
        let path = entry_path(root, &info.name, file);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .await?;
    }
    Ok(())
}

/// Factory for file-backed per-torrent stores.
///
/// Bundles the base directory, the path layout, and the completion store.
/// Construction is configuration-only; no I/O happens until
/// [`StorageBackend::open_torrent`] is called.
pub struct FileStorage {
    base_dir: PathBuf,
    layout: PathLayout,
    completion: Arc<dyn PieceCompletion>,
}

impl FileStorage {
    /// Creates a factory with the flat layout.
    pub fn new(base_dir: impl Into<PathBuf>, completion: Arc<dyn PieceCompletion>) -> Self {
        Self::with_layout(base_dir, PathLayout::Flat, completion)
    }

    /// Creates a factory with an explicit path layout.
    pub fn with_layout(
        base_dir: impl Into<PathBuf>,
        layout: PathLayout,
        completion: Arc<dyn PieceCompletion>,
    ) -> Self {
        Self {
            base_dir: base_dir.into(),
            layout,
            completion,
        }
    }

    /// Creates a factory from the storage configuration section.
    ///
    /// A configured completion directory selects the JSON-backed store;
    /// otherwise records stay in memory.
    pub fn from_config(config: &StorageConfig) -> Self {
        let completion: Arc<dyn PieceCompletion> = match &config.completion_dir {
            Some(dir) => Arc::new(JsonPieceCompletion::new(dir)),
            None => Arc::new(MemoryPieceCompletion::new()),
        };
        Self::with_layout(config.download_dir.clone(), config.layout, completion)
    }

    /// Returns the base directory all storage roots derive from.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }
}

#[async_trait]
impl StorageBackend for FileStorage {
    async fn open_torrent(
        &self,
        info: Arc<TorrentInfo>,
        info_hash: InfoHash,
    ) -> Result<Arc<dyn TorrentStore>, StorageError> {
        let root = self.layout.resolve(&self.base_dir, &info, info_hash);
        create_zero_length_files(&info, &root).await?;
        Ok(Arc::new(FileTorrent::new(
            root,
            info,
            info_hash,
            self.completion.clone(),
        )))
    }

    async fn close(&self) -> Result<(), StorageError> {
        self.completion.close().await
    }
}
