//! One-pass and looping execution of every pipeline stage.
//!
//! A pass runs strictly in order:
//! - harvest feeds into the ledger
//! - route the ledger into partitions
//! - sequence partitions into work items
//! - per lane: retire, resolve, merge

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{error, info, warn};

use super::{LaneReport, PassReport, PipelineError};
use crate::classifier::Router;
use crate::config::{Config, LaneConfig};
use crate::feed::{load_sources, FeedFetcher, Harvester};
use crate::merger::{Merger, Thumbnails};
use crate::resolver::{MetadataClient, Resolver};
use crate::sequencer::{retire_rounds, sequence_all};
use crate::tables::{ContentTable, Ledger, LedgerState};

/// Drives the stages against one data directory.
pub struct PipelineRunner {
    config: Config,
    fetcher: Arc<dyn FeedFetcher>,
    client: Arc<dyn MetadataClient>,

    running: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
}

impl PipelineRunner {
    pub fn new(
        config: Config,
        fetcher: Arc<dyn FeedFetcher>,
        client: Arc<dyn MetadataClient>,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config,
            fetcher,
            client,
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Run every stage once.
    pub async fn run_once(&self) -> Result<PassReport, PipelineError> {
        let config = &self.config;
        let mut report = PassReport::default();

        let (ledger, ledger_state) = Ledger::open(config.ledger_path())?;
        match &ledger_state {
            LedgerState::Repaired { migrated } => {
                warn!(migrated, path = %ledger.path().display(), "Ledger header repaired")
            }
            LedgerState::Replaced => {
                warn!(path = %ledger.path().display(), "Unreadable ledger replaced")
            }
            LedgerState::Missing | LedgerState::Valid => {}
        }
        report.ledger = Some(ledger_state);

        let groups = load_sources(&config.sources_path())?;
        let harvester = Harvester::new(&config.harvester, Arc::clone(&self.fetcher));
        let harvest = harvester.harvest(&groups, &ledger).await?;
        info!(
            groups = harvest.groups,
            served = harvest.groups_served,
            accepted = harvest.accepted,
            duplicates = harvest.duplicates,
            "Harvest finished"
        );
        report.harvest = harvest;

        let partitions_dir = config.partitions_dir();
        let route = Router::new(&config.classifier).route(&ledger, &partitions_dir)?;
        info!(
            routed = route.routed,
            duplicates = route.duplicates,
            unclassifiable = route.unclassifiable,
            "Ledger routed"
        );
        report.route = route;

        let sequence = sequence_all(&partitions_dir)?;
        info!(
            partitions = sequence.partitions,
            created = sequence.created,
            "Partitions sequenced"
        );
        report.sequence = sequence;

        let resolver = Resolver::from_config(Arc::clone(&self.client), &config.resolver);
        for lane in &config.lanes {
            let mut lane_report = LaneReport {
                lane: lane.name.clone(),
                ..Default::default()
            };
            if let Err(e) = self.run_lane(lane, &resolver, &mut lane_report).await {
                error!(lane = %lane.name, error = %e, "Lane failed, continuing with next lane");
                lane_report.error = Some(e.to_string());
            }
            report.lanes.push(lane_report);
        }

        Ok(report)
    }

    async fn run_lane(
        &self,
        lane: &LaneConfig,
        resolver: &Resolver,
        report: &mut LaneReport,
    ) -> Result<(), PipelineError> {
        let config = &self.config;
        let partitions_dir = config.partitions_dir();

        if let Some(retire) = &lane.retire {
            report.retire = Some(retire_rounds(&partitions_dir, lane.quality, retire)?);
        }

        let content = ContentTable::new(config.content_path(lane));
        report.resolve = resolver
            .resolve_lane(&partitions_dir, lane.quality, &content)
            .await?;

        let thumbnails = Thumbnails::load(
            config.thumbnails_path(lane).as_deref(),
            &lane.default_thumbnail,
        );
        report.merge =
            Merger::new(lane, thumbnails).merge(&content, &config.catalog_path(lane))?;

        info!(
            lane = %lane.name,
            archived = report.resolve.items_archived,
            entries = report.merge.entries,
            written = report.merge.written,
            "Lane finished"
        );
        Ok(())
    }

    /// Spawn a loop running a pass every `interval` until [`stop`](Self::stop).
    pub fn start(self: &Arc<Self>, interval: Duration) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Pipeline loop already running");
            return;
        }

        let runner = Arc::clone(self);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        info!(interval_secs = interval.as_secs(), "Starting pipeline loop");

        tokio::spawn(async move {
            loop {
                if let Err(e) = runner.run_once().await {
                    error!(error = %e, "Pipeline pass failed");
                }
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Pipeline loop received shutdown signal");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {}
                }
            }
            runner.running.store(false, Ordering::SeqCst);
        });
    }

    /// Signal the loop to stop after the current pass.
    pub fn stop(&self) {
        if !self.running.load(Ordering::SeqCst) {
            warn!("Pipeline loop not running");
            return;
        }
        let _ = self.shutdown_tx.send(());
    }
}
