//! Types for magnet metadata resolution.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sequencer::SequencerError;
use crate::tables::TableError;

/// Errors that can occur while resolving magnets.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Metadata session failed: {0}")]
    Session(String),

    #[error("Invalid magnet: {0}")]
    InvalidMagnet(String),

    #[error("Metadata unavailable: {0}")]
    Metadata(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Resolution task aborted")]
    Aborted,

    #[error(transparent)]
    Table(#[from] TableError),

    #[error(transparent)]
    Sequencer(#[from] SequencerError),
}

/// One file listed in a torrent descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TorrentFile {
    /// Path relative to the torrent root.
    pub path: String,
    /// Size in bytes.
    pub length: u64,
}

/// Descriptor metadata for one magnet, files in index order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedTorrent {
    /// Lower-case hex info hash.
    pub info_hash: String,
    pub name: Option<String>,
    pub files: Vec<TorrentFile>,
}

/// Metadata-only access to the BitTorrent network.
///
/// Implementations fetch the file listing for a magnet without downloading
/// payload. `release` must be safe to call for hashes that were never
/// added or were already released.
#[async_trait]
pub trait MetadataClient: Send + Sync {
    /// Returns the name of this client implementation.
    fn name(&self) -> &str;

    /// Fetch the descriptor of the torrent behind `magnet`.
    ///
    /// May never complete when no peer serves the metadata; callers bound it.
    async fn resolve(&self, magnet: &str) -> Result<ResolvedTorrent, ResolveError>;

    /// Drop any session state held for `info_hash`.
    async fn release(&self, info_hash: &str) -> Result<(), ResolveError>;
}
