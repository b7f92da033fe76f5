use std::path::Path;

use tracing::info;

use super::{lane_partitions, SequencerError, WorkItemState, WorkSlots};
use crate::classifier::{PartitionKey, Quality};
use crate::config::RetireConfig;
use crate::metrics;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetireReport {
    /// Partition directories of the lane's quality.
    pub rounds_seen: usize,
    pub rounds_retired: usize,
    pub items_retired: usize,
}

/// Move every non-stale work item of old rounds to the stale state.
///
/// Directories of `quality` are ranked by (year, round) descending; the
/// newest `keep_rounds` stay untouched. Round `00` is never ranked and is
/// retired only when `retire_unknown_round` is set.
pub fn retire_rounds(
    partitions_dir: &Path,
    quality: Quality,
    config: &RetireConfig,
) -> Result<RetireReport, SequencerError> {
    let dirs = lane_partitions(partitions_dir, quality)?;
    let mut report = RetireReport {
        rounds_seen: dirs.len(),
        ..Default::default()
    };

    let (unknown, mut ranked): (Vec<_>, Vec<_>) = dirs.into_iter().partition(|key| key.round == 0);
    ranked.sort_by(|a, b| b.cmp(a));

    let mut targets: Vec<PartitionKey> = ranked.into_iter().skip(config.keep_rounds).collect();
    if config.retire_unknown_round {
        targets.extend(unknown);
    }

    for key in targets {
        let slots = WorkSlots::new(partitions_dir.join(key.to_string()));
        let mut retired = 0;
        for item in slots.items()? {
            if item.state != WorkItemState::Stale {
                slots.transition(&item, WorkItemState::Stale)?;
                retired += 1;
            }
        }
        if retired > 0 {
            info!(partition = %key, retired, "Retired work items");
            report.rounds_retired += 1;
            report.items_retired += retired;
        }
    }

    metrics::WORK_ITEMS_RETIRED.inc_by(report.items_retired as u64);
    Ok(report)
}
