//! Mock metadata client for testing.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::fixtures;
use crate::magnet;
use crate::resolver::{MetadataClient, ResolveError, ResolvedTorrent};

/// How the mock answers a given info hash.
#[derive(Debug, Clone)]
enum Behavior {
    Resolve(ResolvedTorrent),
    Delay(Duration, ResolvedTorrent),
    Fail(String),
    /// Never completes, like a magnet with no peers.
    Hang,
}

/// Mock implementation of the MetadataClient trait.
///
/// Provides controllable behavior for testing:
/// - Canned file lists per info hash
/// - Failures and hangs to exercise the timeout path
/// - Releases that never return
/// - Recorded resolve and release calls for assertions
///
/// Unknown hashes fail with a metadata error.
#[derive(Debug)]
pub struct MockMetadataClient {
    behaviors: Arc<RwLock<HashMap<String, Behavior>>>,
    /// Magnet URIs passed to `resolve`, in call order.
    resolve_calls: Arc<RwLock<Vec<String>>>,
    /// Info hashes passed to `release`, in call order.
    released: Arc<RwLock<Vec<String>>>,
    /// Hashes whose `release` never returns.
    stalled_releases: Arc<RwLock<HashSet<String>>>,
}

impl Default for MockMetadataClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockMetadataClient {
    pub fn new() -> Self {
        Self {
            behaviors: Arc::new(RwLock::new(HashMap::new())),
            resolve_calls: Arc::new(RwLock::new(Vec::new())),
            released: Arc::new(RwLock::new(Vec::new())),
            stalled_releases: Arc::new(RwLock::new(HashSet::new())),
        }
    }

    /// Resolve `info_hash` to the given file paths.
    pub async fn add_torrent(&self, info_hash: &str, files: &[&str]) {
        self.set(info_hash, Behavior::Resolve(fixtures::resolved_torrent(info_hash, files)))
            .await;
    }

    /// Resolve `info_hash` after `delay`.
    pub async fn delay(&self, info_hash: &str, delay: Duration, files: &[&str]) {
        self.set(
            info_hash,
            Behavior::Delay(delay, fixtures::resolved_torrent(info_hash, files)),
        )
        .await;
    }

    pub async fn fail(&self, info_hash: &str) {
        self.set(info_hash, Behavior::Fail("no peers".to_string()))
            .await;
    }

    pub async fn hang(&self, info_hash: &str) {
        self.set(info_hash, Behavior::Hang).await;
    }

    /// Make `release` for `info_hash` never return.
    pub async fn stall_release(&self, info_hash: &str) {
        self.stalled_releases
            .write()
            .await
            .insert(info_hash.to_ascii_lowercase());
    }

    pub async fn resolve_calls(&self) -> Vec<String> {
        self.resolve_calls.read().await.clone()
    }

    pub async fn released(&self) -> Vec<String> {
        self.released.read().await.clone()
    }

    async fn set(&self, info_hash: &str, behavior: Behavior) {
        self.behaviors
            .write()
            .await
            .insert(info_hash.to_ascii_lowercase(), behavior);
    }
}

#[async_trait]
impl MetadataClient for MockMetadataClient {
    fn name(&self) -> &str {
        "mock"
    }

    async fn resolve(&self, magnet_uri: &str) -> Result<ResolvedTorrent, ResolveError> {
        self.resolve_calls.write().await.push(magnet_uri.to_string());

        let hash = magnet::info_hash(magnet_uri)
            .ok_or_else(|| ResolveError::InvalidMagnet(magnet_uri.to_string()))?
            .to_ascii_lowercase();
        let behavior = self.behaviors.read().await.get(&hash).cloned();

        match behavior {
            Some(Behavior::Resolve(torrent)) => Ok(torrent),
            Some(Behavior::Delay(delay, torrent)) => {
                tokio::time::sleep(delay).await;
                Ok(torrent)
            }
            Some(Behavior::Fail(reason)) => Err(ResolveError::Metadata(reason)),
            Some(Behavior::Hang) => std::future::pending().await,
            None => Err(ResolveError::Metadata(format!("unknown torrent {}", hash))),
        }
    }

    async fn release(&self, info_hash: &str) -> Result<(), ResolveError> {
        self.released.write().await.push(info_hash.to_string());
        if self.stalled_releases.read().await.contains(info_hash) {
            std::future::pending::<()>().await;
        }
        Ok(())
    }
}
