//! Bounded per-piece window over a torrent store.
//!
//! A piece view restricts reads and writes to exactly one piece's byte
//! range and carries the piece's completion operations. Views are
//! lightweight: a shared handle to the store plus the resolved piece
//! descriptor, created on demand per piece access.

use std::sync::Arc;

use super::completion::Completion;
use super::{StorageError, TorrentStore};
use crate::torrent::{Piece, PieceIndex};

/// Reader/writer window scoped to one piece.
#[derive(Clone)]
pub struct PieceView {
    store: Arc<dyn TorrentStore>,
    piece: Piece,
}

impl PieceView {
    /// Creates a view over the given piece of the store's torrent.
    ///
    /// # Errors
    ///
    /// - `StorageError::InvalidPiece` - If the index is past the torrent's piece count
    pub fn new(store: Arc<dyn TorrentStore>, index: PieceIndex) -> Result<Self, StorageError> {
        let piece = store
            .info()
            .piece(index)
            .ok_or(StorageError::InvalidPiece { index })?;
        Ok(Self { store, piece })
    }

    /// Returns the piece this view is scoped to.
    pub fn piece(&self) -> Piece {
        self.piece
    }

    /// Reads into `buf` starting at `offset` within the piece.
    ///
    /// Requests reaching past the window are clamped to it; a non-empty read
    /// starting at or past the window end fails with `EndOfData`, matching a
    /// read past the whole payload.
    ///
    /// # Errors
    ///
    /// - `StorageError::EndOfData` - If the window holds no data at `offset`
    /// - `StorageError::UnexpectedEndOfData` - If backing data ran out mid-range
    /// - `StorageError::Io` - If a file operation failed
    pub async fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize, StorageError> {
        if buf.is_empty() {
            return Ok(0);
        }
        if offset >= self.piece.length {
            return Err(StorageError::EndOfData);
        }
        let want = buf.len().min((self.piece.length - offset) as usize);
        self.store
            .read_at(self.piece.offset + offset, &mut buf[..want])
            .await
    }

    /// Writes `data` starting at `offset` within the piece.
    ///
    /// Writes reaching past the window are clamped to it; the returned count
    /// tells the caller how much was accepted. A non-empty write starting at
    /// or past the window end fails with `EndOfData`.
    ///
    /// # Errors
    ///
    /// - `StorageError::EndOfData` - If `offset` lies at or past the window end
    /// - `StorageError::Io` - If a file operation failed
    pub async fn write_at(&self, offset: u64, data: &[u8]) -> Result<usize, StorageError> {
        if data.is_empty() {
            return Ok(0);
        }
        if offset >= self.piece.length {
            return Err(StorageError::EndOfData);
        }
        let span = data.len().min((self.piece.length - offset) as usize);
        self.store
            .write_at(self.piece.offset + offset, &data[..span])
            .await
    }

    /// Reads the entire piece into a fresh buffer.
    ///
    /// # Errors
    ///
    /// - `StorageError::UnexpectedEndOfData` - If the piece is not fully backed by data
    /// - `StorageError::Io` - If a file operation failed
    pub async fn read_piece(&self) -> Result<Vec<u8>, StorageError> {
        let mut buf = vec![0u8; self.piece.length as usize];
        let n = self.read_at(0, &mut buf).await?;
        if n < buf.len() {
            return Err(StorageError::UnexpectedEndOfData {
                offset: self.piece.offset + n as u64,
            });
        }
        Ok(buf)
    }

    /// Returns this piece's completion record, validated by the backend.
    ///
    /// # Errors
    ///
    /// - `StorageError::Completion` - If the completion store lookup failed
    /// - `StorageError::Io` - If validating against storage failed
    pub async fn completion(&self) -> Result<Completion, StorageError> {
        self.store.completion(self.piece).await
    }

    /// Records this piece as complete.
    ///
    /// # Errors
    ///
    /// - `StorageError::Completion` - If the record cannot be persisted
    pub async fn mark_complete(&self) -> Result<(), StorageError> {
        self.store.mark_complete(self.piece).await
    }

    /// Records this piece as not complete.
    ///
    /// # Errors
    ///
    /// - `StorageError::Completion` - If the record cannot be persisted
    pub async fn mark_not_complete(&self) -> Result<(), StorageError> {
        self.store.mark_not_complete(self.piece).await
    }
}
