//! Seabed Core - piece-addressed file persistence for torrent downloads
//!
//! This crate is the storage layer of a piece-oriented download client: it
//! maps piece-relative reads and writes onto a torrent's physical files,
//! caches per-file handles, materializes zero-length files at open time, and
//! tracks piece completion with validation against actual on-disk sizes.

pub mod config;
pub mod storage;
pub mod torrent;
pub mod tracing_setup;

// Re-export main types for convenient access
pub use config::SeabedConfig;
pub use storage::{
    Completion, FileStorage, MemoryStorage, PieceCompletion, PieceView, StorageBackend,
    StorageError, TorrentStore,
};
pub use torrent::{InfoHash, PieceIndex, TorrentInfo};

/// Core errors that can bubble up from any Seabed subsystem.
#[derive(Debug, thiserror::Error)]
pub enum SeabedError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SeabedError>;
