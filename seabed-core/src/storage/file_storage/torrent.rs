//! Per-torrent file store: extent translation and completion validation.
//!
//! The torrent payload is addressed as one contiguous byte stream; this
//! module walks the ordered file list to turn payload-absolute offsets into
//! per-file operations. Getting the walk right is what keeps a piece that
//! straddles file boundaries from corrupting either neighbor.

use std::io::SeekFrom;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::{debug, warn};

use super::entry_path;
use super::handle::{FileHandle, HandleCache};
use crate::storage::completion::{Completion, PieceCompletion};
use crate::storage::{StorageError, TorrentStore};
use crate::torrent::{InfoHash, Piece, TorrentFile, TorrentInfo};

/// File-backed store for one torrent.
///
/// Owns the handle cache for the torrent's files and the resolved storage
/// root. Created by the `FileStorage` factory after zero-length files have
/// been materialized.
pub struct FileTorrent {
    root: PathBuf,
    info: Arc<TorrentInfo>,
    info_hash: InfoHash,
    completion: Arc<dyn PieceCompletion>,
    handles: HandleCache,
}

impl FileTorrent {
    pub(super) fn new(
        root: PathBuf,
        info: Arc<TorrentInfo>,
        info_hash: InfoHash,
        completion: Arc<dyn PieceCompletion>,
    ) -> Self {
        Self {
            root,
            info,
            info_hash,
            completion,
            handles: HandleCache::new(),
        }
    }

    async fn open_file(
        &self,
        file: &TorrentFile,
        creatable: bool,
    ) -> Result<Arc<FileHandle>, StorageError> {
        self.handles
            .open(&entry_path(&self.root, &self.info.name, file), creatable)
            .await
    }

    /// Reads from one file entry, clamped to the entry's declared length.
    ///
    /// `offset` is relative to the entry's start and must lie inside it. A
    /// file missing on disk reads as zero bytes; a file shorter than its
    /// declared length yields a short count. The caller decides what either
    /// means at the payload level.
    async fn read_file_at(
        &self,
        file: &TorrentFile,
        buf: &mut [u8],
        offset: u64,
    ) -> Result<usize, StorageError> {
        let handle = match self.open_file(file, false).await {
            Ok(handle) => handle,
            Err(StorageError::EndOfData) => return Ok(0),
            Err(e) => return Err(e),
        };

        let want = buf.len().min((file.length - offset) as usize);
        let mut guard = handle.lock().await;
        guard.seek(SeekFrom::Start(offset)).await?;

        let mut read = 0;
        while read < want {
            let n = guard.read(&mut buf[read..want]).await?;
            if n == 0 {
                break;
            }
            read += n;
        }
        Ok(read)
    }

    /// File entries the piece depends on, with the length each must cover.
    ///
    /// An entry is required when its span intersects the piece's byte range;
    /// the required length is measured from the entry's own start, so an
    /// on-disk size at or above it proves the piece's bytes are present.
    /// Zero-length entries are trivially satisfied and skipped.
    fn required_extents(&self, piece: Piece) -> Vec<(&TorrentFile, u64)> {
        let piece_end = piece.offset + piece.length;
        let mut required = Vec::new();
        let mut start = 0u64;
        for file in &self.info.files {
            if start >= piece_end {
                break;
            }
            let file_end = start + file.length;
            if file.length != 0 && file_end > piece.offset {
                required.push((file, file.length.min(piece_end - start)));
            }
            start = file_end;
        }
        required
    }

    /// Current on-disk size of the entry's file, `None` if unavailable.
    async fn file_size(&self, file: &TorrentFile) -> Result<Option<u64>, StorageError> {
        match self.open_file(file, false).await {
            Ok(handle) => {
                let guard = handle.lock().await;
                Ok(guard.metadata().await.ok().map(|m| m.len()))
            }
            Err(StorageError::EndOfData) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl TorrentStore for FileTorrent {
    fn info(&self) -> &Arc<TorrentInfo> {
        &self.info
    }

    fn info_hash(&self) -> InfoHash {
        self.info_hash
    }

    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize, StorageError> {
        if buf.is_empty() {
            return Ok(0);
        }

        let mut remaining = offset;
        let mut filled = 0;
        for file in &self.info.files {
            while remaining < file.length {
                let n = self.read_file_at(file, &mut buf[filled..], remaining).await?;
                filled += n;
                remaining += n as u64;
                if filled == buf.len() {
                    return Ok(filled);
                }
                if n == 0 {
                    // The entry owes more bytes than the disk holds while the
                    // request is still unsatisfied: truncation, not end-of-range.
                    return Err(StorageError::UnexpectedEndOfData {
                        offset: offset + filled as u64,
                    });
                }
            }
            remaining -= file.length;
        }

        if filled == 0 {
            Err(StorageError::EndOfData)
        } else {
            Ok(filled)
        }
    }

    async fn write_at(&self, offset: u64, data: &[u8]) -> Result<usize, StorageError> {
        let mut remaining = offset;
        let mut written = 0;
        for file in &self.info.files {
            if remaining >= file.length {
                remaining -= file.length;
                continue;
            }

            let span = (data.len() - written).min((file.length - remaining) as usize);
            let handle = self.open_file(file, true).await?;
            {
                // Each entry's portion is written under that file's own lock;
                // a spanning write never holds two locks at once.
                let mut guard = handle.lock().await;
                guard.seek(SeekFrom::Start(remaining)).await?;
                guard.write_all(&data[written..written + span]).await?;
            }

            written += span;
            remaining = 0;
            if written == data.len() {
                break;
            }
        }
        Ok(written)
    }

    async fn completion(&self, piece: Piece) -> Result<Completion, StorageError> {
        let key = piece.key(self.info_hash);
        let mut record = self.completion.get(key).await?;
        if !record.known || !record.complete {
            return Ok(record);
        }

        // The store claims the piece is complete; confirm each required file
        // still covers its share before believing it.
        for (file, required) in self.required_extents(piece) {
            let size = self.file_size(file).await?;
            if size.map_or(true, |size| size < required) {
                debug!(
                    piece = %piece.index,
                    file = %entry_path(&self.root, &self.info.name, file).display(),
                    required,
                    "completion record is stale, downgrading"
                );
                record.complete = false;
                break;
            }
        }

        if !record.complete {
            // Best effort: the caller still learns the truth even if the
            // correction cannot be persisted right now.
            if let Err(e) = self.completion.set(key, false).await {
                warn!(piece = %piece.index, error = %e, "failed to persist completion downgrade");
            }
        }
        Ok(record)
    }

    async fn mark_complete(&self, piece: Piece) -> Result<(), StorageError> {
        self.completion.set(piece.key(self.info_hash), true).await
    }

    async fn mark_not_complete(&self, piece: Piece) -> Result<(), StorageError> {
        self.completion.set(piece.key(self.info_hash), false).await
    }

    /// Closes every cached handle, attempting all of them and returning the
    /// first error observed after the sweep.
    async fn close(&self) -> Result<(), StorageError> {
        self.handles.close_all().await
    }
}
