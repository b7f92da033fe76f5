//! Periodic catalog snapshot reload.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use formulio_core::CatalogStore;

use crate::metrics::record_reload;

/// Check every fragment's modification time each `interval` until shutdown.
pub fn spawn_reload_loop(
    store: Arc<CatalogStore>,
    interval: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    info!(interval_secs = interval.as_secs(), "Starting catalog reload loop");

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Reload loop received shutdown signal");
                    break;
                }
                _ = tokio::time::sleep(interval) => {
                    let report = store.reload().await;
                    record_reload(&report);
                    if report.reloaded > 0 || report.failed > 0 {
                        info!(
                            reloaded = report.reloaded,
                            failed = report.failed,
                            "Catalog snapshots refreshed"
                        );
                    } else {
                        debug!(unchanged = report.unchanged, missing = report.missing, "No catalog changes");
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use formulio_core::catalog::{CatalogEntry, CatalogFragment, EpisodeKey};
    use formulio_core::classifier::Quality;
    use formulio_core::LaneCatalog;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_loop_picks_up_new_fragment_and_stops() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fhd.json");
        let store = Arc::new(CatalogStore::new(vec![LaneCatalog {
            lane: "fhd".to_string(),
            series_id: "s1".to_string(),
            quality: Quality::Fhd,
            display_name: "FHD".to_string(),
            poster: None,
            path: path.clone(),
        }]));

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = spawn_reload_loop(
            Arc::clone(&store),
            Duration::from_millis(20),
            shutdown_rx,
        );

        let mut fragment = CatalogFragment::new("s1");
        fragment.insert(
            EpisodeKey::new(1, 1),
            CatalogEntry {
                title: "Race".to_string(),
                thumbnail: String::new(),
                info_hash: "abc".to_string(),
                file_idx: 0,
                filename: "Race.mkv".to_string(),
            },
        );
        std::fs::write(&path, fragment.to_json().unwrap()).unwrap();

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(store.snapshot("fhd").await.len(), 1);

        shutdown_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
