//! Storage layer for torrent payload data.
//!
//! Defines the backend interface for piece-addressed persistence together
//! with the file-based and in-memory implementations. The file backend maps
//! piece-relative reads and writes onto the torrent's physical files and
//! cross-checks piece completion against actual on-disk sizes.

pub mod completion;
pub mod file_storage;
pub mod memory;
pub mod piece;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_fixtures;

use std::sync::Arc;

use async_trait::async_trait;
pub use completion::{Completion, JsonPieceCompletion, MemoryPieceCompletion, PieceCompletion};
pub use file_storage::{FileStorage, FileTorrent, PathLayout, create_zero_length_files};
pub use memory::MemoryStorage;
pub use piece::PieceView;

use crate::torrent::{InfoHash, Piece, PieceIndex, TorrentInfo};

/// Errors that occur during storage operations.
///
/// The two end-of-data variants are deliberately distinct: `EndOfData` marks
/// a read past everything the torrent can ever hold ("nothing here yet"),
/// while `UnexpectedEndOfData` marks a backing file that is shorter than its
/// declared length — corruption or external truncation, never safe to
/// swallow.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Requested range lies beyond any data the torrent can hold
    #[error("end of torrent data")]
    EndOfData,

    /// A backing file ended before its declared length mid-range
    #[error("unexpected end of data at offset {offset}")]
    UnexpectedEndOfData {
        /// Absolute payload offset at which data ran out
        offset: u64,
    },

    /// Piece index at or past the torrent's piece count
    #[error("piece {index} is out of range")]
    InvalidPiece {
        /// The rejected piece index
        index: PieceIndex,
    },

    /// Backend was asked about a torrent it has not opened
    #[error("torrent {info_hash} not found")]
    TorrentNotFound {
        /// Info hash of the unknown torrent
        info_hash: InfoHash,
    },

    /// Completion store failed to read or persist a record
    #[error("completion store error: {reason}")]
    Completion {
        /// Description of the completion store failure
        reason: String,
    },

    /// Standard I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Process-wide entry point for opening per-torrent storage.
///
/// Implementations bundle whatever configuration they need (directories,
/// layout policy, completion store) so that opening a torrent is a single
/// call. File-backed and in-memory variants ship with this crate.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Opens per-torrent storage, performing any one-time setup.
    ///
    /// For the file backend this resolves the storage root and materializes
    /// zero-length files before any piece I/O can happen.
    ///
    /// # Errors
    ///
    /// - `StorageError::Io` - If required files or directories cannot be created
    async fn open_torrent(
        &self,
        info: Arc<TorrentInfo>,
        info_hash: InfoHash,
    ) -> Result<Arc<dyn TorrentStore>, StorageError>;

    /// Releases backend-wide resources, including the completion store.
    ///
    /// # Errors
    ///
    /// - `StorageError::Completion` - If the completion store fails to close
    async fn close(&self) -> Result<(), StorageError>;
}

/// Per-torrent storage: payload-absolute I/O plus completion tracking.
///
/// Offsets are relative to the start of the torrent's logical byte stream;
/// implementations translate them to their physical representation. Stores
/// are cheap to share behind `Arc` and safe for concurrent use.
#[async_trait]
pub trait TorrentStore: Send + Sync {
    /// Returns the torrent metadata this store was opened with.
    fn info(&self) -> &Arc<TorrentInfo>;

    /// Returns the info hash this store was opened with.
    fn info_hash(&self) -> InfoHash;

    /// Reads into `buf` starting at the payload-absolute `offset`.
    ///
    /// Returns the number of bytes read; a short count means the read hit
    /// the true end of the payload.
    ///
    /// # Errors
    ///
    /// - `StorageError::EndOfData` - If the range holds no data at all
    /// - `StorageError::UnexpectedEndOfData` - If backing data ran out mid-range
    /// - `StorageError::Io` - If a file operation failed
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Writes `data` starting at the payload-absolute `offset`.
    ///
    /// Returns the number of bytes written; writes past the payload end are
    /// truncated to it.
    ///
    /// # Errors
    ///
    /// - `StorageError::Io` - If a file operation failed
    async fn write_at(&self, offset: u64, data: &[u8]) -> Result<usize, StorageError>;

    /// Returns the piece's completion record, validated against storage.
    ///
    /// A record claiming completion is only trusted after the backend has
    /// confirmed the claim is still consistent with what it holds; a stale
    /// claim is downgraded and the correction persisted.
    ///
    /// # Errors
    ///
    /// - `StorageError::Completion` - If the completion store lookup failed
    /// - `StorageError::Io` - If validating against storage failed
    async fn completion(&self, piece: Piece) -> Result<Completion, StorageError>;

    /// Records the piece as complete.
    ///
    /// # Errors
    ///
    /// - `StorageError::Completion` - If the record cannot be persisted
    async fn mark_complete(&self, piece: Piece) -> Result<(), StorageError>;

    /// Records the piece as not complete.
    ///
    /// # Errors
    ///
    /// - `StorageError::Completion` - If the record cannot be persisted
    async fn mark_not_complete(&self, piece: Piece) -> Result<(), StorageError>;

    /// Releases per-torrent resources such as cached file handles.
    ///
    /// # Errors
    ///
    /// - `StorageError::Io` - If releasing a resource failed
    async fn close(&self) -> Result<(), StorageError>;
}
