//! librqbit embedded metadata client.

use std::ops::Range;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use librqbit::{
    AddTorrent, AddTorrentOptions, AddTorrentResponse, ManagedTorrent, Session, SessionOptions,
};
use tracing::{debug, info, warn};

use super::{MetadataClient, ResolveError, ResolvedTorrent, TorrentFile};
use crate::config::ResolverConfig;
use crate::magnet;

/// Resolves magnets through an embedded librqbit session.
///
/// Torrents are added paused, so only the info dictionary is exchanged with
/// peers. The session output folder never receives payload.
pub struct LibrqbitMetadataClient {
    session: Arc<Session>,
}

/// Single-port range for the session listener; `None` when `port` is `u16::MAX`.
fn listen_port_range(port: u16) -> Option<Range<u16>> {
    port.checked_add(1).map(|end| port..end)
}

impl LibrqbitMetadataClient {
    /// Start a session rooted at `session_dir`.
    pub async fn new(config: &ResolverConfig, session_dir: PathBuf) -> Result<Self, ResolveError> {
        std::fs::create_dir_all(&session_dir).map_err(|e| {
            ResolveError::Session(format!("Failed to create session directory: {}", e))
        })?;

        let mut opts = SessionOptions::default();
        if !config.enable_dht {
            opts.disable_dht = true;
        }
        if let Some(range) = config.listen_port.and_then(listen_port_range) {
            opts.listen_port_range = Some(range);
        }

        info!(
            session_dir = %session_dir.display(),
            dht_enabled = !opts.disable_dht,
            "Initializing librqbit session"
        );

        let session = Session::new_with_opts(session_dir, opts)
            .await
            .map_err(|e| {
                ResolveError::Session(format!("Failed to initialize librqbit session: {}", e))
            })?;

        if let Some(port) = session.tcp_listen_port() {
            info!(port = port, "librqbit listening on TCP port");
        }

        Ok(Self { session })
    }

    fn find_torrent(&self, hash: &str) -> Option<Arc<ManagedTorrent>> {
        let hash_lower = hash.to_lowercase();
        self.session.with_torrents(|iter| {
            for (_, torrent) in iter {
                if torrent.info_hash().as_string() == hash_lower {
                    return Some(torrent.clone());
                }
            }
            None
        })
    }

    fn describe(handle: &Arc<ManagedTorrent>) -> Result<ResolvedTorrent, ResolveError> {
        let info_hash = handle.info_hash().as_string();
        let metadata = handle
            .metadata
            .load_full()
            .ok_or_else(|| ResolveError::Metadata(format!("no descriptor for {}", info_hash)))?;

        let name = handle.name().map(|s| s.to_string());
        // Multi-file torrents list paths under the torrent's root folder.
        let root = name.as_deref().filter(|_| metadata.file_infos.len() > 1);
        let files = metadata
            .file_infos
            .iter()
            .map(|f| {
                let relative = f.relative_filename.to_string_lossy();
                let path = match root {
                    Some(root) => format!("{}/{}", root, relative),
                    None => relative.to_string(),
                };
                TorrentFile {
                    path,
                    length: f.len,
                }
            })
            .collect();

        Ok(ResolvedTorrent {
            info_hash,
            name,
            files,
        })
    }
}

#[async_trait]
impl MetadataClient for LibrqbitMetadataClient {
    fn name(&self) -> &str {
        "librqbit"
    }

    async fn resolve(&self, magnet_uri: &str) -> Result<ResolvedTorrent, ResolveError> {
        if !magnet::is_magnet(magnet_uri) || magnet::info_hash(magnet_uri).is_none() {
            return Err(ResolveError::InvalidMagnet(magnet_uri.to_string()));
        }

        // Adding a magnet waits for the descriptor; paused keeps it metadata-only.
        let opts = AddTorrentOptions {
            paused: true,
            ..Default::default()
        };
        let response = self
            .session
            .add_torrent(AddTorrent::from_url(magnet_uri), Some(opts))
            .await
            .map_err(|e| ResolveError::Metadata(format!("Failed to add torrent: {}", e)))?;

        match response {
            AddTorrentResponse::Added(_, handle) => {
                debug!(info_hash = %handle.info_hash().as_string(), "Descriptor received");
                Self::describe(&handle)
            }
            AddTorrentResponse::AlreadyManaged(_, handle) => {
                warn!(info_hash = %handle.info_hash().as_string(), "Torrent already in session");
                Self::describe(&handle)
            }
            AddTorrentResponse::ListOnly(_) => Err(ResolveError::Metadata(
                "Torrent was added in list-only mode".to_string(),
            )),
        }
    }

    async fn release(&self, info_hash: &str) -> Result<(), ResolveError> {
        let Some(torrent) = self.find_torrent(info_hash) else {
            return Ok(());
        };

        self.session
            .delete(torrent.id().into(), false)
            .await
            .map_err(|e| ResolveError::Session(format!("Failed to remove torrent: {}", e)))?;

        debug!(info_hash = %info_hash, "Torrent released");
        Ok(())
    }
}
