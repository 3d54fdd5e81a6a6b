//! Integration tests for the file storage backend.
//!
//! These tests exercise the public storage API against real temporary
//! directories: piece round trips across file boundaries, zero-length file
//! materialization, truncation detection, and completion self-healing.

use std::path::PathBuf;
use std::sync::Arc;

use seabed_core::storage::{
    Completion, FileStorage, JsonPieceCompletion, MemoryPieceCompletion, PathLayout,
    PieceCompletion, PieceView, StorageBackend, StorageError, TorrentStore,
};
use seabed_core::torrent::{InfoHash, PieceIndex, TorrentFile, TorrentInfo};
use tempfile::TempDir;

/// Test fixture owning a download directory and a file storage backend.
struct StorageFixture {
    _temp_dir: TempDir,
    download_dir: PathBuf,
    backend: FileStorage,
    info: Arc<TorrentInfo>,
    info_hash: InfoHash,
}

impl StorageFixture {
    /// Creates a fixture over the multi-file layout with in-memory completion.
    fn new() -> Self {
        Self::with_completion(Arc::new(MemoryPieceCompletion::new()))
    }

    fn with_completion(completion: Arc<dyn PieceCompletion>) -> Self {
        let temp_dir = tempfile::tempdir().unwrap();
        let download_dir = temp_dir.path().join("downloads");
        std::fs::create_dir_all(&download_dir).unwrap();

        let backend = FileStorage::new(&download_dir, completion);

        Self {
            _temp_dir: temp_dir,
            download_dir,
            backend,
            info: Arc::new(multi_file_info()),
            info_hash: InfoHash::new([0x42; 20]),
        }
    }

    /// Opens a fresh store for the fixture torrent. Each call builds a new
    /// handle cache, which is what a client restart looks like to this layer.
    async fn open(&self) -> Arc<dyn TorrentStore> {
        self.backend
            .open_torrent(self.info.clone(), self.info_hash)
            .await
            .unwrap()
    }

    fn view(&self, store: &Arc<dyn TorrentStore>, index: u32) -> PieceView {
        PieceView::new(store.clone(), PieceIndex::new(index)).unwrap()
    }

    /// Absolute path of one payload file under the flat layout.
    fn file_path(&self, name: &str) -> PathBuf {
        self.download_dir.join(&self.info.name).join(name)
    }

    /// Deterministic payload bytes for a piece.
    fn piece_bytes(&self, index: u32) -> Vec<u8> {
        let piece = self.info.piece(PieceIndex::new(index)).unwrap();
        (0..piece.length)
            .map(|i| (index as u64 * 31 + i) as u8)
            .collect()
    }
}

/// 32 payload bytes in 16-byte pieces across two real files (10 + 22 bytes)
/// and two zero-length entries, one nested.
fn multi_file_info() -> TorrentInfo {
    TorrentInfo {
        name: "multi".to_string(),
        piece_length: 16,
        files: vec![
            TorrentFile {
                path: vec!["a.bin".to_string()],
                length: 10,
            },
            TorrentFile {
                path: vec!["empty.bin".to_string()],
                length: 0,
            },
            TorrentFile {
                path: vec!["sub".to_string(), "also-empty.bin".to_string()],
                length: 0,
            },
            TorrentFile {
                path: vec!["b.bin".to_string()],
                length: 22,
            },
        ],
    }
}

#[tokio::test]
async fn test_piece_round_trip() {
    let fixture = StorageFixture::new();
    let store = fixture.open().await;

    for index in 0..fixture.info.piece_count() {
        let view = fixture.view(&store, index);
        let data = fixture.piece_bytes(index);
        assert_eq!(view.write_at(0, &data).await.unwrap(), data.len());
    }

    for index in 0..fixture.info.piece_count() {
        let view = fixture.view(&store, index);
        assert_eq!(view.read_piece().await.unwrap(), fixture.piece_bytes(index));
    }

    store.close().await.unwrap();
}

#[tokio::test]
async fn test_boundary_write_splits_across_files() {
    let fixture = StorageFixture::new();
    let store = fixture.open().await;

    // Piece 0 covers all 10 bytes of a.bin and the first 6 of b.bin.
    let view = fixture.view(&store, 0);
    let data = fixture.piece_bytes(0);
    view.write_at(0, &data).await.unwrap();
    store.close().await.unwrap();

    let first = std::fs::read(fixture.file_path("a.bin")).unwrap();
    assert_eq!(first, &data[..10]);

    let second = std::fs::read(fixture.file_path("b.bin")).unwrap();
    assert_eq!(second, &data[10..]);
}

#[tokio::test]
async fn test_boundary_read_recomposes_the_buffer() {
    let fixture = StorageFixture::new();
    let store = fixture.open().await;

    let view = fixture.view(&store, 0);
    let data = fixture.piece_bytes(0);
    view.write_at(0, &data).await.unwrap();

    // Read the spanning range in one call through a fresh store.
    let reopened = fixture.open().await;
    let view = fixture.view(&reopened, 0);
    assert_eq!(view.read_piece().await.unwrap(), data);
}

#[tokio::test]
async fn test_zero_length_files_exist_after_open() {
    let fixture = StorageFixture::new();
    let _store = fixture.open().await;

    // Present before any piece I/O has happened.
    for name in ["empty.bin", "sub/also-empty.bin"] {
        let path = fixture.file_path(name);
        let metadata = std::fs::metadata(&path).unwrap();
        assert!(metadata.is_file(), "{} missing", path.display());
        assert_eq!(metadata.len(), 0);
    }

    // The non-zero entries are created lazily, not at open.
    assert!(!fixture.file_path("a.bin").exists());
}

#[tokio::test]
async fn test_truncated_file_reads_as_unexpected_end_of_data() {
    let fixture = StorageFixture::new();
    let store = fixture.open().await;

    for index in 0..2 {
        let view = fixture.view(&store, index);
        view.write_at(0, &fixture.piece_bytes(index)).await.unwrap();
    }
    store.close().await.unwrap();

    // Shorten b.bin below its declared 22 bytes behind the storage's back.
    let truncated = std::fs::OpenOptions::new()
        .write(true)
        .open(fixture.file_path("b.bin"))
        .unwrap();
    truncated.set_len(3).unwrap();
    drop(truncated);

    let reopened = fixture.open().await;
    let view = fixture.view(&reopened, 1);
    let result = view.read_piece().await;
    assert!(
        matches!(result, Err(StorageError::UnexpectedEndOfData { .. })),
        "expected UnexpectedEndOfData, got {result:?}"
    );
}

#[tokio::test]
async fn test_read_at_total_length_is_end_of_data() {
    let fixture = StorageFixture::new();
    let store = fixture.open().await;

    for index in 0..2 {
        let view = fixture.view(&store, index);
        view.write_at(0, &fixture.piece_bytes(index)).await.unwrap();
    }

    let mut buf = [0u8; 4];
    let result = store.read_at(fixture.info.total_length(), &mut buf).await;
    assert!(matches!(result, Err(StorageError::EndOfData)));
}

#[tokio::test]
async fn test_completion_self_heals_after_file_deletion() {
    let fixture = StorageFixture::new();
    let store = fixture.open().await;

    let view = fixture.view(&store, 0);
    view.write_at(0, &fixture.piece_bytes(0)).await.unwrap();
    view.mark_complete().await.unwrap();
    assert_eq!(view.completion().await.unwrap(), Completion::of(true));
    store.close().await.unwrap();

    std::fs::remove_file(fixture.file_path("b.bin")).unwrap();

    // A fresh store sees the deletion, reports incomplete, and persists the
    // correction so later lookups agree without re-stating files.
    let reopened = fixture.open().await;
    let view = fixture.view(&reopened, 0);
    assert_eq!(view.completion().await.unwrap(), Completion::of(false));
    assert_eq!(view.completion().await.unwrap(), Completion::of(false));
}

#[tokio::test]
async fn test_completion_self_heals_after_truncation() {
    let fixture = StorageFixture::new();
    let store = fixture.open().await;

    let view = fixture.view(&store, 1);
    view.write_at(0, &fixture.piece_bytes(1)).await.unwrap();
    view.mark_complete().await.unwrap();
    store.close().await.unwrap();

    let truncated = std::fs::OpenOptions::new()
        .write(true)
        .open(fixture.file_path("b.bin"))
        .unwrap();
    truncated.set_len(5).unwrap();
    drop(truncated);

    let reopened = fixture.open().await;
    let view = fixture.view(&reopened, 1);
    assert_eq!(view.completion().await.unwrap(), Completion::of(false));
}

#[tokio::test]
async fn test_marking_is_idempotent() {
    let fixture = StorageFixture::new();
    let store = fixture.open().await;
    let view = fixture.view(&store, 0);

    view.write_at(0, &fixture.piece_bytes(0)).await.unwrap();

    view.mark_complete().await.unwrap();
    view.mark_complete().await.unwrap();
    assert_eq!(view.completion().await.unwrap(), Completion::of(true));

    view.mark_not_complete().await.unwrap();
    view.mark_not_complete().await.unwrap();
    assert_eq!(view.completion().await.unwrap(), Completion::of(false));
}

#[tokio::test]
async fn test_cached_handle_survives_unlink() {
    let fixture = StorageFixture::new();
    let store = fixture.open().await;

    let view = fixture.view(&store, 1);
    let data = fixture.piece_bytes(1);
    view.write_at(0, &data).await.unwrap();

    // Unlinking the path cannot invalidate the handle the store already
    // holds, so the read below can only succeed if both operations went
    // through the same cached handle.
    std::fs::remove_file(fixture.file_path("b.bin")).unwrap();

    assert_eq!(view.read_piece().await.unwrap(), data);
}

#[tokio::test]
async fn test_concurrent_writers_on_disjoint_pieces() {
    let fixture = StorageFixture::new();
    let store = fixture.open().await;

    let mut tasks = Vec::new();
    for index in 0..fixture.info.piece_count() {
        let view = fixture.view(&store, index);
        let data = fixture.piece_bytes(index);
        tasks.push(tokio::spawn(async move {
            view.write_at(0, &data).await.unwrap();
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    for index in 0..fixture.info.piece_count() {
        let view = fixture.view(&store, index);
        assert_eq!(view.read_piece().await.unwrap(), fixture.piece_bytes(index));
    }
}

#[tokio::test]
async fn test_per_info_hash_layout_separates_torrents() {
    let temp_dir = tempfile::tempdir().unwrap();
    let backend = FileStorage::with_layout(
        temp_dir.path(),
        PathLayout::PerInfoHash,
        Arc::new(MemoryPieceCompletion::new()),
    );

    let info = Arc::new(multi_file_info());
    let info_hash = InfoHash::new([0x42; 20]);
    let store = backend.open_torrent(info.clone(), info_hash).await.unwrap();

    let view = PieceView::new(store.clone(), PieceIndex::new(0)).unwrap();
    view.write_at(0, &[7u8; 16]).await.unwrap();
    store.close().await.unwrap();

    let root = temp_dir.path().join(info_hash.to_string());
    assert!(root.join(&info.name).join("a.bin").is_file());
    assert!(root.join(&info.name).join("empty.bin").is_file());
}

#[tokio::test]
async fn test_completion_records_persist_across_backends() {
    let temp_dir = tempfile::tempdir().unwrap();
    let completion_dir = temp_dir.path().join("completion");
    let download_dir = temp_dir.path().join("downloads");
    std::fs::create_dir_all(&download_dir).unwrap();

    let info = Arc::new(multi_file_info());
    let info_hash = InfoHash::new([0x42; 20]);

    {
        let backend = FileStorage::new(
            &download_dir,
            Arc::new(JsonPieceCompletion::new(&completion_dir)),
        );
        let store = backend.open_torrent(info.clone(), info_hash).await.unwrap();
        let view = PieceView::new(store.clone(), PieceIndex::new(0)).unwrap();
        view.write_at(0, &[9u8; 16]).await.unwrap();
        view.mark_complete().await.unwrap();
        store.close().await.unwrap();
        backend.close().await.unwrap();
    }

    // A second process over the same directories sees the record, and the
    // on-disk files still satisfy it.
    let backend = FileStorage::new(
        &download_dir,
        Arc::new(JsonPieceCompletion::new(&completion_dir)),
    );
    let store = backend.open_torrent(info, info_hash).await.unwrap();
    let view = PieceView::new(store, PieceIndex::new(0)).unwrap();
    assert_eq!(view.completion().await.unwrap(), Completion::of(true));
}

#[tokio::test]
async fn test_open_is_idempotent_for_zero_length_files() {
    let fixture = StorageFixture::new();

    let first = fixture.open().await;
    first.close().await.unwrap();
    let _second = fixture.open().await;

    let path = fixture.file_path("empty.bin");
    assert_eq!(std::fs::metadata(path).unwrap().len(), 0);
}
