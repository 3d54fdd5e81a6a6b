//! Centralized configuration for Seabed.
//!
//! All tunable parameters live here so call sites never carry hard-coded
//! paths or policy choices.

use std::path::PathBuf;

use crate::storage::PathLayout;

/// Central configuration for all Seabed components.
///
/// Groups related settings into logical sections; today storage is the only
/// section, but callers should reach components through here so new sections
/// slot in without churn.
#[derive(Debug, Clone, Default)]
pub struct SeabedConfig {
    pub storage: StorageConfig,
}

/// File storage configuration.
///
/// Controls where torrent payload lands, how per-torrent roots are derived,
/// and whether completion records persist across runs.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Directory receiving torrent payload files
    pub download_dir: PathBuf,
    /// How each torrent's storage root derives from the download directory
    pub layout: PathLayout,
    /// Directory for persisted completion records (None keeps them in memory)
    pub completion_dir: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            download_dir: PathBuf::from("downloads"),
            layout: PathLayout::Flat,
            completion_dir: None,
        }
    }
}
