//! Piece completion tracking.
//!
//! A completion store remembers which pieces have been fully written and
//! verified. Records are provisional by design: the file backend re-checks
//! "complete" claims against actual file sizes before trusting them, so a
//! store only ever needs to be a fast key/value map, not a source of truth.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::fs;

use super::StorageError;
use crate::torrent::{InfoHash, PieceKey};

/// Stored judgment about one piece.
///
/// `known = false` means the store has no opinion (the piece was never
/// recorded); `complete` is only meaningful when `known` is set, and even
/// then callers must treat it as provisional until validated against disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Completion {
    pub known: bool,
    pub complete: bool,
}

impl Completion {
    /// Returns the record for a piece the store knows nothing about.
    pub fn unknown() -> Self {
        Self {
            known: false,
            complete: false,
        }
    }

    /// Returns a known record with the given completion flag.
    pub fn of(complete: bool) -> Self {
        Self {
            known: true,
            complete,
        }
    }
}

/// Persistent store of per-piece completion records.
///
/// Keys are `(info_hash, piece_index)` pairs, independent of on-disk layout.
/// Implementations must support concurrent access to independent keys.
#[async_trait]
pub trait PieceCompletion: Send + Sync {
    /// Looks up the record for one piece.
    ///
    /// # Errors
    ///
    /// - `StorageError::Completion` - If the store cannot be read
    async fn get(&self, key: PieceKey) -> Result<Completion, StorageError>;

    /// Records whether the piece is complete, overwriting any prior record.
    ///
    /// # Errors
    ///
    /// - `StorageError::Completion` - If the record cannot be persisted
    async fn set(&self, key: PieceKey, complete: bool) -> Result<(), StorageError>;

    /// Releases store resources.
    ///
    /// # Errors
    ///
    /// - `StorageError::Completion` - If the store fails to close cleanly
    async fn close(&self) -> Result<(), StorageError>;
}

/// Completion store held entirely in memory.
///
/// Records do not survive the process; suitable for tests, the in-memory
/// storage backend, and callers that re-verify pieces on startup anyway.
#[derive(Debug, Default)]
pub struct MemoryPieceCompletion {
    records: RwLock<HashMap<PieceKey, bool>>,
}

impl MemoryPieceCompletion {
    /// Creates an empty in-memory completion store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PieceCompletion for MemoryPieceCompletion {
    async fn get(&self, key: PieceKey) -> Result<Completion, StorageError> {
        Ok(self
            .records
            .read()
            .get(&key)
            .copied()
            .map_or_else(Completion::unknown, Completion::of))
    }

    async fn set(&self, key: PieceKey, complete: bool) -> Result<(), StorageError> {
        self.records.write().insert(key, complete);
        Ok(())
    }

    async fn close(&self) -> Result<(), StorageError> {
        Ok(())
    }
}

/// On-disk shape of one torrent's completion records.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct TorrentRecords {
    pieces: HashMap<u32, bool>,
}

/// Completion store persisted as one JSON file per torrent.
///
/// Each torrent's records live in `<dir>/<info_hash>.json` as a map from
/// piece index to completion flag. Every `set` rewrites the torrent's file,
/// which keeps the store crash-consistent at piece granularity without a
/// database dependency.
#[derive(Debug)]
pub struct JsonPieceCompletion {
    dir: PathBuf,
    torrents: tokio::sync::RwLock<HashMap<InfoHash, TorrentRecords>>,
}

impl JsonPieceCompletion {
    /// Creates a store rooted at `dir`. The directory is created lazily on
    /// the first persisted record.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            torrents: tokio::sync::RwLock::new(HashMap::new()),
        }
    }

    fn record_path(&self, info_hash: InfoHash) -> PathBuf {
        self.dir.join(format!("{info_hash}.json"))
    }

    /// Loads the torrent's records from disk if not already cached.
    async fn ensure_loaded(&self, info_hash: InfoHash) -> Result<(), StorageError> {
        if self.torrents.read().await.contains_key(&info_hash) {
            return Ok(());
        }

        let records = match fs::read(self.record_path(info_hash)).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| StorageError::Completion {
                reason: format!("corrupt completion records for {info_hash}: {e}"),
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => TorrentRecords::default(),
            Err(e) => {
                return Err(StorageError::Completion {
                    reason: format!("failed to read completion records for {info_hash}: {e}"),
                });
            }
        };

        // A racing load may have inserted first; either copy is equivalent.
        self.torrents
            .write()
            .await
            .entry(info_hash)
            .or_insert(records);
        Ok(())
    }

    async fn persist(&self, info_hash: InfoHash, records: &TorrentRecords) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec_pretty(records).map_err(|e| StorageError::Completion {
            reason: format!("failed to encode completion records: {e}"),
        })?;
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| StorageError::Completion {
                reason: format!("failed to create completion directory: {e}"),
            })?;
        fs::write(self.record_path(info_hash), bytes)
            .await
            .map_err(|e| StorageError::Completion {
                reason: format!("failed to write completion records for {info_hash}: {e}"),
            })
    }
}

#[async_trait]
impl PieceCompletion for JsonPieceCompletion {
    async fn get(&self, key: PieceKey) -> Result<Completion, StorageError> {
        self.ensure_loaded(key.info_hash).await?;
        let torrents = self.torrents.read().await;
        Ok(torrents
            .get(&key.info_hash)
            .and_then(|records| records.pieces.get(&key.index.as_u32()))
            .copied()
            .map_or_else(Completion::unknown, Completion::of))
    }

    async fn set(&self, key: PieceKey, complete: bool) -> Result<(), StorageError> {
        self.ensure_loaded(key.info_hash).await?;
        let mut torrents = self.torrents.write().await;
        let records = torrents.entry(key.info_hash).or_default();
        records.pieces.insert(key.index.as_u32(), complete);
        let snapshot = records.clone();
        drop(torrents);
        self.persist(key.info_hash, &snapshot).await
    }

    async fn close(&self) -> Result<(), StorageError> {
        // Every set already reached disk; nothing buffered remains.
        Ok(())
    }
}
