use std::cmp::Ordering;
use std::path::Path;

use tracing::{info, warn};

use super::{SequencerError, WorkRow, WorkSlots};
use crate::magnet;
use crate::metrics;
use crate::tables::{list_partitions, LedgerRow, PartitionFile};

/// Counts for one sequencing pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SequenceReport {
    pub partitions: usize,
    pub rows: usize,
    pub created: usize,
    /// Slots already present in some state.
    pub claimed: usize,
    /// Rows whose magnet carries no info-hash; their slot stays empty.
    pub missing_hash: usize,
    pub malformed: usize,
    pub failed_partitions: usize,
}

impl SequenceReport {
    fn absorb(&mut self, other: SequenceReport) {
        self.partitions += other.partitions;
        self.rows += other.rows;
        self.created += other.created;
        self.claimed += other.claimed;
        self.missing_hash += other.missing_hash;
        self.malformed += other.malformed;
        self.failed_partitions += other.failed_partitions;
    }
}

/// Broadcast day rank: Friday 1, Saturday 2, Sunday 3, anything else 4.
pub fn day_priority(title: &str) -> u8 {
    let lower = title.to_ascii_lowercase();
    if lower.contains("friday") {
        1
    } else if lower.contains("saturday") {
        2
    } else if lower.contains("sunday") {
        3
    } else {
        4
    }
}

/// Sequence every partition file in `partitions_dir`.
pub fn sequence_all(partitions_dir: &Path) -> Result<SequenceReport, SequencerError> {
    let mut report = SequenceReport::default();
    for partition in list_partitions(partitions_dir)? {
        match sequence_partition(&partition) {
            Ok(r) => report.absorb(r),
            Err(e) => {
                warn!(partition = %partition.key(), error = %e, "Failed to sequence partition");
                report.failed_partitions += 1;
            }
        }
    }
    Ok(report)
}

/// Sort a partition's rows and materialize every unclaimed slot.
///
/// All rows are re-sorted on each call; slot `n` always goes to the n-th
/// row in sorted order, but an existing file for `n` in any state wins.
pub fn sequence_partition(partition: &PartitionFile) -> Result<SequenceReport, SequencerError> {
    let (mut rows, malformed) = partition.rows()?;
    sort_rows(&mut rows);

    let slots = WorkSlots::new(partition.work_dir());
    let mut report = SequenceReport {
        partitions: 1,
        rows: rows.len(),
        malformed,
        ..Default::default()
    };

    for (idx, row) in rows.iter().enumerate() {
        let slot = idx as u32 + 1;
        if slots.state_of(slot).is_some() {
            report.claimed += 1;
            continue;
        }
        let Some(info_hash) = magnet::info_hash(&row.link) else {
            warn!(
                partition = %partition.key(),
                slot,
                title = %row.title,
                "No info-hash in link, leaving slot empty"
            );
            report.missing_hash += 1;
            continue;
        };
        let work = WorkRow {
            title: row.title.clone(),
            info_hash,
            magnet: row.link.clone(),
        };
        if slots.create(slot, &[work])? {
            report.created += 1;
        }
    }

    if report.created > 0 {
        info!(partition = %partition.key(), created = report.created, "Work items created");
        metrics::WORK_ITEMS_CREATED.inc_by(report.created as u64);
    }
    Ok(report)
}

/// Day priority first, then publish time; undecodable dates sort last.
fn sort_rows(rows: &mut [LedgerRow]) {
    rows.sort_by(|a, b| {
        day_priority(&a.title)
            .cmp(&day_priority(&b.title))
            .then_with(|| match (a.published_at(), b.published_at()) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            })
    });
}
