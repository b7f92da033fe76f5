use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::{CatalogError, CatalogFragment};
use crate::classifier::Quality;
use crate::config::Config;

/// One episode of a series as served to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogVideo {
    pub season: u8,
    pub episode: u32,
    pub title: String,
    pub thumbnail: String,
    pub info_hash: String,
    pub file_idx: usize,
    pub filename: String,
}

/// Immutable view of one lane's fragment.
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    videos: Vec<CatalogVideo>,
}

impl CatalogSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_fragment(fragment: &CatalogFragment) -> Self {
        let videos = fragment
            .entries()
            .map(|(key, entry)| CatalogVideo {
                season: key.round,
                episode: key.episode,
                title: entry.title.clone(),
                thumbnail: entry.thumbnail.clone(),
                info_hash: entry.info_hash.clone(),
                file_idx: entry.file_idx,
                filename: entry.filename.clone(),
            })
            .collect();
        Self { videos }
    }

    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        Ok(Self::from_fragment(&CatalogFragment::load(path)?))
    }

    /// Videos in (season, episode) order.
    pub fn videos(&self) -> &[CatalogVideo] {
        &self.videos
    }

    pub fn len(&self) -> usize {
        self.videos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.videos.is_empty()
    }

    pub fn streams(&self, season: u8, episode: u32) -> Vec<&CatalogVideo> {
        self.videos
            .iter()
            .filter(|v| v.season == season && v.episode == episode)
            .collect()
    }
}

/// Where a lane's fragment lives and how its series is presented.
#[derive(Debug, Clone, Serialize)]
pub struct LaneCatalog {
    pub lane: String,
    pub series_id: String,
    pub quality: Quality,
    pub display_name: String,
    pub poster: Option<String>,
    #[serde(skip)]
    pub path: PathBuf,
}

impl LaneCatalog {
    pub fn from_config(config: &Config) -> Vec<Self> {
        config
            .lanes
            .iter()
            .map(|lane| Self {
                lane: lane.name.clone(),
                series_id: lane.series_id.clone(),
                quality: lane.quality,
                display_name: lane.display_name.clone().unwrap_or_else(|| lane.name.clone()),
                poster: lane.poster.clone(),
                path: config.catalog_path(lane),
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
struct Loaded {
    snapshot: Arc<CatalogSnapshot>,
    modified: Option<SystemTime>,
}

/// Counts for one reload pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReloadReport {
    pub reloaded: usize,
    pub unchanged: usize,
    pub missing: usize,
    /// Fragments that changed but failed to parse; the previous snapshot stays.
    pub failed: usize,
}

/// Per-lane snapshots, swapped whole when a fragment's mtime changes.
#[derive(Debug)]
pub struct CatalogStore {
    lanes: Vec<LaneCatalog>,
    loaded: RwLock<HashMap<String, Loaded>>,
}

impl CatalogStore {
    pub fn new(lanes: Vec<LaneCatalog>) -> Self {
        Self {
            lanes,
            loaded: RwLock::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(LaneCatalog::from_config(config))
    }

    pub fn lanes(&self) -> &[LaneCatalog] {
        &self.lanes
    }

    /// Lanes presenting `series_id`, in configuration order.
    pub fn lanes_for(&self, series_id: &str) -> Vec<&LaneCatalog> {
        self.lanes
            .iter()
            .filter(|l| l.series_id == series_id)
            .collect()
    }

    /// Re-read every fragment whose modification time changed.
    pub async fn reload(&self) -> ReloadReport {
        let mut report = ReloadReport::default();

        for lane in &self.lanes {
            let modified = match fs::metadata(&lane.path).and_then(|m| m.modified()) {
                Ok(modified) => modified,
                Err(_) => {
                    debug!(lane = %lane.lane, path = %lane.path.display(), "Fragment not present");
                    report.missing += 1;
                    continue;
                }
            };

            let previous = self
                .loaded
                .read()
                .await
                .get(&lane.lane)
                .and_then(|l| l.modified);
            if previous == Some(modified) {
                report.unchanged += 1;
                continue;
            }

            match CatalogSnapshot::load(&lane.path) {
                Ok(snapshot) => {
                    info!(lane = %lane.lane, videos = snapshot.len(), "Catalog snapshot loaded");
                    self.loaded.write().await.insert(
                        lane.lane.clone(),
                        Loaded {
                            snapshot: Arc::new(snapshot),
                            modified: Some(modified),
                        },
                    );
                    report.reloaded += 1;
                }
                Err(e) => {
                    warn!(lane = %lane.lane, error = %e, "Keeping previous catalog snapshot");
                    report.failed += 1;
                }
            }
        }

        report
    }

    /// Current snapshot of a lane; empty until its fragment first loads.
    pub async fn snapshot(&self, lane: &str) -> Arc<CatalogSnapshot> {
        self.loaded
            .read()
            .await
            .get(lane)
            .map(|l| Arc::clone(&l.snapshot))
            .unwrap_or_default()
    }

    /// Every video of a series across its lanes, in (season, episode) order.
    pub async fn videos(&self, series_id: &str) -> Vec<CatalogVideo> {
        let mut videos = Vec::new();
        for lane in self.lanes_for(series_id) {
            videos.extend(self.snapshot(&lane.lane).await.videos().iter().cloned());
        }
        videos.sort_by_key(|v| (v.season, v.episode));
        videos
    }

    pub async fn streams(&self, series_id: &str, season: u8, episode: u32) -> Vec<CatalogVideo> {
        let mut streams = Vec::new();
        for lane in self.lanes_for(series_id) {
            let snapshot = self.snapshot(&lane.lane).await;
            streams.extend(snapshot.streams(season, episode).into_iter().cloned());
        }
        streams
    }
}
