//! In-memory storage implementation.
//!
//! Holds each torrent's payload in a single zero-initialized buffer.
//! Useful for tests and simulation runs that exercise piece plumbing
//! without touching disk; completion validation is trivial because a
//! buffer can never go stale behind the store's back.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::completion::{Completion, MemoryPieceCompletion, PieceCompletion};
use super::{StorageBackend, StorageError, TorrentStore};
use crate::torrent::{InfoHash, Piece, TorrentInfo};

/// Factory for in-memory per-torrent stores.
///
/// Reopening a torrent returns the store already holding its buffer, so a
/// caller can close and reopen views without losing written data.
pub struct MemoryStorage {
    completion: Arc<dyn PieceCompletion>,
    torrents: RwLock<HashMap<InfoHash, Arc<MemoryTorrent>>>,
}

impl MemoryStorage {
    /// Creates a backend with its own in-memory completion store.
    pub fn new() -> Self {
        Self::with_completion(Arc::new(MemoryPieceCompletion::new()))
    }

    /// Creates a backend over an externally owned completion store.
    pub fn with_completion(completion: Arc<dyn PieceCompletion>) -> Self {
        Self {
            completion,
            torrents: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    async fn open_torrent(
        &self,
        info: Arc<TorrentInfo>,
        info_hash: InfoHash,
    ) -> Result<Arc<dyn TorrentStore>, StorageError> {
        let mut torrents = self.torrents.write();
        let store = torrents
            .entry(info_hash)
            .or_insert_with(|| {
                Arc::new(MemoryTorrent {
                    data: RwLock::new(vec![0u8; info.total_length() as usize]),
                    info,
                    info_hash,
                    completion: self.completion.clone(),
                })
            })
            .clone();
        Ok(store)
    }

    async fn close(&self) -> Result<(), StorageError> {
        self.completion.close().await
    }
}

/// In-memory store for one torrent's payload.
pub struct MemoryTorrent {
    info: Arc<TorrentInfo>,
    info_hash: InfoHash,
    completion: Arc<dyn PieceCompletion>,
    data: RwLock<Vec<u8>>,
}

#[async_trait]
impl TorrentStore for MemoryTorrent {
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
        let data = self.data.read();
        if offset >= data.len() as u64 {
            return Err(StorageError::EndOfData);
        }
        let start = offset as usize;
        let n = buf.len().min(data.len() - start);
        buf[..n].copy_from_slice(&data[start..start + n]);
        Ok(n)
    }

    async fn write_at(&self, offset: u64, data: &[u8]) -> Result<usize, StorageError> {
        let mut payload = self.data.write();
        if offset >= payload.len() as u64 {
            return Ok(0);
        }
        let start = offset as usize;
        let n = data.len().min(payload.len() - start);
        payload[start..start + n].copy_from_slice(&data[..n]);
        Ok(n)
    }

    async fn completion(&self, piece: Piece) -> Result<Completion, StorageError> {
        // The buffer cannot be truncated externally, so the stored record
        // needs no cross-check against it.
        self.completion.get(piece.key(self.info_hash)).await
    }

    async fn mark_complete(&self, piece: Piece) -> Result<(), StorageError> {
        self.completion.set(piece.key(self.info_hash), true).await
    }

    async fn mark_not_complete(&self, piece: Piece) -> Result<(), StorageError> {
        self.completion.set(piece.key(self.info_hash), false).await
    }

    async fn close(&self) -> Result<(), StorageError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_fixtures::{single_file_info, test_info_hash};

    async fn open_store() -> Arc<dyn TorrentStore> {
        MemoryStorage::new()
            .open_torrent(Arc::new(single_file_info()), test_info_hash(9))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_round_trip() {
        let store = open_store().await;

        let data = [1u8, 2, 3, 4, 5];
        assert_eq!(store.write_at(7, &data).await.unwrap(), data.len());

        let mut buf = [0u8; 5];
        assert_eq!(store.read_at(7, &mut buf).await.unwrap(), 5);
        assert_eq!(buf, data);
    }

    #[tokio::test]
    async fn test_read_past_payload_is_end_of_data() {
        let store = open_store().await;
        let total = store.info().total_length();

        let mut buf = [0u8; 1];
        assert!(matches!(
            store.read_at(total, &mut buf).await,
            Err(StorageError::EndOfData)
        ));
    }

    #[tokio::test]
    async fn test_reopen_keeps_written_data() {
        let backend = MemoryStorage::new();
        let info = Arc::new(single_file_info());
        let hash = test_info_hash(9);

        let store = backend.open_torrent(info.clone(), hash).await.unwrap();
        store.write_at(0, b"persist").await.unwrap();
        store.close().await.unwrap();

        let reopened = backend.open_torrent(info, hash).await.unwrap();
        let mut buf = [0u8; 7];
        reopened.read_at(0, &mut buf).await.unwrap();
        assert_eq!(&buf, b"persist");
    }

    #[tokio::test]
    async fn test_completion_round_trip() {
        let store = open_store().await;
        let piece = store.info().piece(crate::torrent::PieceIndex::new(0)).unwrap();

        assert_eq!(store.completion(piece).await.unwrap(), Completion::unknown());

        store.mark_complete(piece).await.unwrap();
        assert_eq!(store.completion(piece).await.unwrap(), Completion::of(true));

        store.mark_not_complete(piece).await.unwrap();
        assert_eq!(store.completion(piece).await.unwrap(), Completion::of(false));
    }
}
