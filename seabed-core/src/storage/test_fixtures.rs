//! Test fixtures for storage testing.
//!
//! Provides small, deterministic torrent layouts and identities so storage
//! tests across modules agree on geometry instead of re-deriving it.

use std::path::PathBuf;

use crate::torrent::{InfoHash, TorrentFile, TorrentInfo};

/// Creates a temporary download directory for file-backend tests.
///
/// # Panics
///
/// Panics if the temporary directory cannot be created. Acceptable in test
/// fixtures where a failure indicates an environment issue.
pub fn temp_download_dir() -> (tempfile::TempDir, PathBuf) {
    let temp_dir = tempfile::tempdir().unwrap();
    let download_dir = temp_dir.path().join("downloads");
    std::fs::create_dir_all(&download_dir).unwrap();
    (temp_dir, download_dir)
}

/// Info hash whose bytes are all `seed`, for tests that need distinct
/// torrent identities.
pub fn test_info_hash(seed: u8) -> InfoHash {
    InfoHash::new([seed; 20])
}

/// Single 40-byte file cut into 16-byte pieces (the last piece is 8 bytes).
pub fn single_file_info() -> TorrentInfo {
    TorrentInfo {
        name: "single".to_string(),
        piece_length: 16,
        files: vec![TorrentFile {
            path: vec!["payload.bin".to_string()],
            length: 40,
        }],
    }
}

/// Multi-file layout exercising boundary crossing and zero-length entries.
///
/// 32 payload bytes in 16-byte pieces: piece 0 spans the 10-byte first file
/// and the head of the 22-byte last file. Two zero-length entries (one
/// nested in a subdirectory) cover materialization.
pub fn multi_file_info() -> TorrentInfo {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_download_dir() {
        let (_temp_dir, download_dir) = temp_download_dir();
        assert!(download_dir.is_dir());
    }

    #[test]
    fn test_fixture_geometry_is_stable() {
        let single = single_file_info();
        assert_eq!(single.total_length(), 40);
        assert_eq!(single.piece_count(), 3);

        let multi = multi_file_info();
        assert_eq!(multi.total_length(), 32);
        assert_eq!(multi.piece_count(), 2);
    }
}
