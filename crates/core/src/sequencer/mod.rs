//! Partition sequencing and the work item lifecycle.

mod retire;
mod sequence;
mod work_item;

pub use retire::{retire_rounds, RetireReport};
pub use sequence::{day_priority, sequence_all, sequence_partition, SequenceReport};
pub use work_item::{lane_partitions, WorkItem, WorkItemState, WorkRow, WorkSlots, WORK_ITEM_HEADER};

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::tables::TableError;

#[derive(Debug, Error)]
pub enum SequencerError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Table(#[from] TableError),
}

impl SequencerError {
    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}
