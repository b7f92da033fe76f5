use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::{MetadataClient, ResolveError, ResolvedTorrent};
use crate::classifier::Quality;
use crate::config::ResolverConfig;
use crate::magnet;
use crate::metrics;
use crate::sequencer::{lane_partitions, WorkItem, WorkItemState, WorkRow, WorkSlots};
use crate::tables::{ContentKey, ContentRecord, ContentTable};

/// Release budget once the resolve attempt has used up its timeout.
const RELEASE_GRACE: Duration = Duration::from_millis(500);

/// Counts for one resolver pass over a lane.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolveReport {
    pub partitions: usize,
    pub items_archived: usize,
    /// Items with at least one unresolved magnet.
    pub items_pending: usize,
    /// Items that could not be read or recorded.
    pub items_failed: usize,
    pub magnets_resolved: usize,
    pub magnets_failed: usize,
    pub files_recorded: usize,
    pub duplicate_files: usize,
    pub malformed_rows: usize,
}

/// Turns pending work items into content table rows.
///
/// Magnets are resolved one at a time. Each attempt runs in its own task and
/// is abandoned once `timeout` elapses.
pub struct Resolver {
    client: Arc<dyn MetadataClient>,
    timeout: Duration,
}

impl Resolver {
    pub fn new(client: Arc<dyn MetadataClient>, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    pub fn from_config(client: Arc<dyn MetadataClient>, config: &ResolverConfig) -> Self {
        Self::new(client, Duration::from_secs(config.timeout_secs))
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Resolve one magnet within the timeout, then release it from the client.
    pub async fn resolve_magnet(&self, magnet_uri: &str) -> Result<ResolvedTorrent, ResolveError> {
        let client = Arc::clone(&self.client);
        let uri = magnet_uri.to_string();
        let started = Instant::now();

        let mut task = tokio::spawn(async move { client.resolve(&uri).await });
        let outcome = match tokio::time::timeout(self.timeout, &mut task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) if join_error.is_cancelled() => Err(ResolveError::Aborted),
            Ok(Err(join_error)) => Err(ResolveError::Session(format!(
                "Resolution task failed: {}",
                join_error
            ))),
            Err(_) => {
                task.abort();
                Err(ResolveError::Timeout(self.timeout))
            }
        };
        metrics::RESOLVE_DURATION.observe(started.elapsed().as_secs_f64());

        let outcome_label = match &outcome {
            Ok(_) => "resolved",
            Err(ResolveError::Timeout(_)) => "timeout",
            Err(_) => "failed",
        };
        metrics::MAGNETS_RESOLVED
            .with_label_values(&[outcome_label])
            .inc();

        let release_hash = match &outcome {
            Ok(torrent) => Some(torrent.info_hash.clone()),
            Err(_) => magnet::info_hash(magnet_uri).map(|h| h.to_ascii_lowercase()),
        };
        if let Some(hash) = release_hash {
            let budget = self
                .timeout
                .saturating_sub(started.elapsed())
                .max(RELEASE_GRACE.min(self.timeout));
            self.release(&hash, budget).await;
        }

        outcome
    }

    async fn release(&self, info_hash: &str, budget: Duration) {
        match tokio::time::timeout(budget, self.client.release(info_hash)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(info_hash = %info_hash, error = %e, "Failed to release torrent"),
            Err(_) => warn!(info_hash = %info_hash, "Timed out releasing torrent"),
        }
    }

    /// Resolve every pending item in the partition directories of `quality`.
    ///
    /// Directories are visited in key order and items in slot order. An item
    /// is archived only when all of its magnets resolved.
    pub async fn resolve_lane(
        &self,
        partitions_dir: &Path,
        quality: Quality,
        content: &ContentTable,
    ) -> Result<ResolveReport, ResolveError> {
        let mut known = content.keys()?;
        let mut report = ResolveReport::default();
        info!(
            quality = %quality,
            client = self.client.name(),
            known_files = known.len(),
            "Starting resolver pass"
        );

        for key in lane_partitions(partitions_dir, quality)? {
            report.partitions += 1;
            let slots = WorkSlots::new(partitions_dir.join(key.to_string()));
            let pending = match slots.pending() {
                Ok(pending) => pending,
                Err(e) => {
                    warn!(partition = %key, error = %e, "Failed to list work items");
                    continue;
                }
            };

            for item in pending {
                if let Err(e) = self
                    .resolve_item(&slots, &item, &mut known, content, &mut report)
                    .await
                {
                    warn!(partition = %key, slot = item.slot, error = %e, "Work item failed");
                    report.items_failed += 1;
                }
            }
        }

        info!(
            archived = report.items_archived,
            pending = report.items_pending,
            files = report.files_recorded,
            "Resolver pass finished"
        );
        Ok(report)
    }

    async fn resolve_item(
        &self,
        slots: &WorkSlots,
        item: &WorkItem,
        known: &mut HashSet<ContentKey>,
        content: &ContentTable,
        report: &mut ResolveReport,
    ) -> Result<(), ResolveError> {
        let (rows, malformed) = item.rows()?;
        report.malformed_rows += malformed;
        if rows.is_empty() {
            warn!(slot = item.slot, path = %item.path().display(), "Work item has no magnets");
            report.items_pending += 1;
            return Ok(());
        }

        let mut complete = true;
        let mut records = Vec::new();
        let mut batch: HashSet<ContentKey> = HashSet::new();

        for row in &rows {
            match self.resolve_magnet(&row.magnet).await {
                Ok(torrent) => {
                    report.magnets_resolved += 1;
                    for record in content_records(row, &torrent) {
                        let key = record.key();
                        if known.contains(&key) || !batch.insert(key) {
                            report.duplicate_files += 1;
                            continue;
                        }
                        records.push(record);
                    }
                }
                Err(e) => {
                    warn!(slot = item.slot, title = %row.title, error = %e, "Magnet not resolved");
                    report.magnets_failed += 1;
                    complete = false;
                }
            }
        }

        report.files_recorded += content.append(&records)?;
        known.extend(batch);

        if complete {
            slots.transition(item, WorkItemState::Archived)?;
            report.items_archived += 1;
            debug!(slot = item.slot, files = records.len(), "Work item archived");
        } else {
            report.items_pending += 1;
        }
        Ok(())
    }
}

/// One record per file, in file index order. The work row's hash wins over
/// the client's so the table keeps the hash the feed announced.
fn content_records(row: &WorkRow, torrent: &ResolvedTorrent) -> Vec<ContentRecord> {
    let info_hash = if row.info_hash.is_empty() {
        torrent.info_hash.clone()
    } else {
        row.info_hash.clone()
    };
    torrent
        .files
        .iter()
        .enumerate()
        .map(|(file_idx, file)| ContentRecord {
            title: row.title.clone(),
            path: file.path.clone(),
            info_hash: info_hash.clone(),
            file_idx,
        })
        .collect()
}
