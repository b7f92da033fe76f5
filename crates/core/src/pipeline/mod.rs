//! End-to-end pass over every stage.

mod runner;

pub use runner::PipelineRunner;

use thiserror::Error;

use crate::classifier::RouteReport;
use crate::feed::{FeedError, HarvestReport};
use crate::merger::{MergeError, MergeReport};
use crate::resolver::{ResolveError, ResolveReport};
use crate::sequencer::{RetireReport, SequenceReport, SequencerError};
use crate::tables::{LedgerState, TableError};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("harvest failed: {0}")]
    Feed(#[from] FeedError),

    #[error("table error: {0}")]
    Table(#[from] TableError),

    #[error("sequencing failed: {0}")]
    Sequencer(#[from] SequencerError),

    #[error("resolution failed: {0}")]
    Resolve(#[from] ResolveError),

    #[error("merge failed: {0}")]
    Merge(#[from] MergeError),
}

/// Outcome of the per-lane stages.
#[derive(Debug, Clone, Default)]
pub struct LaneReport {
    pub lane: String,
    /// Present only when the lane configures retirement.
    pub retire: Option<RetireReport>,
    pub resolve: ResolveReport,
    pub merge: MergeReport,
    /// Set when a lane stage failed; later lanes still run.
    pub error: Option<String>,
}

impl LaneReport {
    pub fn failed(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Debug, Clone, Default)]
pub struct PassReport {
    pub ledger: Option<LedgerState>,
    pub harvest: HarvestReport,
    pub route: RouteReport,
    pub sequence: SequenceReport,
    pub lanes: Vec<LaneReport>,
}
