//! Torrent metadata model consumed by the storage layer.
//!
//! These types sit at the boundary to the external metadata parser: the
//! storage backends only ever read them. A torrent's payload is one logical
//! byte stream cut into fixed-size pieces; physically it is a list of files
//! laid out back to back, which is what `TorrentInfo` describes.

use std::fmt;

/// SHA-1 hash identifying a unique torrent.
///
/// 20-byte hash of the metainfo's info dictionary. Used to namespace
/// completion records and optional per-torrent storage directories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InfoHash([u8; 20]);

impl InfoHash {
    /// Creates InfoHash from 20-byte SHA-1 hash.
    pub fn new(hash: [u8; 20]) -> Self {
        Self(hash)
    }

    /// Parses InfoHash from a 40-character hex string.
    ///
    /// # Errors
    ///
    /// - `InvalidInfoHash` - If the input is not exactly 20 hex-encoded bytes
    pub fn from_hex(hex_str: &str) -> Result<Self, InvalidInfoHash> {
        let bytes = hex::decode(hex_str).map_err(|e| InvalidInfoHash {
            reason: e.to_string(),
        })?;
        let hash: [u8; 20] = bytes.try_into().map_err(|_| InvalidInfoHash {
            reason: "expected 20 bytes".to_string(),
        })?;
        Ok(Self(hash))
    }

    /// Returns reference to underlying 20-byte hash.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Display for InfoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// Error produced when parsing a malformed info hash string.
#[derive(Debug, thiserror::Error)]
#[error("Invalid info hash: {reason}")]
pub struct InvalidInfoHash {
    reason: String,
}

/// Zero-based index of a piece within a torrent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PieceIndex(pub u32);

impl PieceIndex {
    /// Creates PieceIndex from zero-based index.
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    /// Returns the underlying piece index as u32.
    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for PieceIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable identity of one piece across all torrents.
///
/// Completion records are keyed by this pair; it is independent of where the
/// piece's bytes live on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PieceKey {
    pub info_hash: InfoHash,
    pub index: PieceIndex,
}

impl PieceKey {
    /// Creates a key for the given torrent and piece.
    pub fn new(info_hash: InfoHash, index: PieceIndex) -> Self {
        Self { info_hash, index }
    }
}

/// Individual file within a torrent.
///
/// Path components are relative to the torrent's name directory. Files are
/// laid out consecutively: the k-th file starts at the sum of all preceding
/// lengths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TorrentFile {
    pub path: Vec<String>,
    pub length: u64,
}

/// Metadata the storage layer needs about one torrent.
///
/// Supplied fully parsed by the external metadata layer and never mutated
/// here. Piece geometry (offsets, the short final piece) is derived from
/// `piece_length` and the file list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TorrentInfo {
    pub name: String,
    pub piece_length: u32,
    pub files: Vec<TorrentFile>,
}

impl TorrentInfo {
    /// Returns the total payload length, the sum of all file lengths.
    pub fn total_length(&self) -> u64 {
        self.files.iter().map(|f| f.length).sum()
    }

    /// Returns the number of pieces the payload divides into.
    pub fn piece_count(&self) -> u32 {
        let total = self.total_length();
        total.div_ceil(u64::from(self.piece_length)) as u32
    }

    /// Resolves a piece index to its byte range within the payload.
    ///
    /// Every piece spans `piece_length` bytes except the final one, which
    /// covers whatever remains. Returns `None` for indices at or past
    /// `piece_count`.
    pub fn piece(&self, index: PieceIndex) -> Option<Piece> {
        let total = self.total_length();
        let offset = u64::from(index.as_u32()) * u64::from(self.piece_length);
        if offset >= total {
            return None;
        }
        let length = u64::from(self.piece_length).min(total - offset);
        Some(Piece {
            index,
            offset,
            length,
        })
    }
}

/// One piece's resolved position within the torrent payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Piece {
    pub index: PieceIndex,
    pub offset: u64,
    pub length: u64,
}

impl Piece {
    /// Returns the completion key for this piece under the given torrent.
    pub fn key(&self, info_hash: InfoHash) -> PieceKey {
        PieceKey::new(info_hash, self.index)
    }
}
