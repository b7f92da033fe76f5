use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::SequencerError;
use crate::classifier::{PartitionKey, Quality};
use crate::tables::{read_table, write_table};

pub const WORK_ITEM_HEADER: [&str; 3] = ["title", "infoHash", "magnet"];

/// Lifecycle of a numbered work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkItemState {
    /// Waiting for the resolver.
    Pending,
    /// Every magnet resolved.
    Archived,
    /// Retired without (complete) resolution.
    Stale,
}

impl WorkItemState {
    pub const ALL: [WorkItemState; 3] = [
        WorkItemState::Pending,
        WorkItemState::Archived,
        WorkItemState::Stale,
    ];

    /// On-disk file extension encoding this state.
    pub fn extension(&self) -> &'static str {
        match self {
            WorkItemState::Pending => "csv",
            WorkItemState::Archived => "archive",
            WorkItemState::Stale => "old",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.extension() == ext)
    }
}

/// One magnet line of a work item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkRow {
    pub title: String,
    pub info_hash: String,
    pub magnet: String,
}

impl WorkRow {
    fn fields(&self) -> [&str; 3] {
        [&self.title, &self.info_hash, &self.magnet]
    }
}

/// A work item file found in a slot directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub slot: u32,
    pub state: WorkItemState,
    path: PathBuf,
}

impl WorkItem {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Magnet rows, plus the count of rows that lacked a magnet column.
    pub fn rows(&self) -> Result<(Vec<WorkRow>, usize), SequencerError> {
        let table = read_table(&self.path)?;
        let mut malformed = table.malformed;
        let mut rows = Vec::with_capacity(table.rows.len());
        for fields in table.rows {
            match <[String; 3]>::try_from(fields) {
                Ok([title, info_hash, magnet]) if !magnet.trim().is_empty() => rows.push(WorkRow {
                    title,
                    info_hash: info_hash.trim().to_string(),
                    magnet: magnet.trim().to_string(),
                }),
                _ => malformed += 1,
            }
        }
        Ok((rows, malformed))
    }
}

/// Numbered work item slots of one partition directory.
///
/// A slot is claimed as soon as a file exists for it in any state.
#[derive(Debug, Clone)]
pub struct WorkSlots {
    dir: PathBuf,
}

impl WorkSlots {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, slot: u32, state: WorkItemState) -> PathBuf {
        self.dir.join(format!("{slot}.{}", state.extension()))
    }

    pub fn state_of(&self, slot: u32) -> Option<WorkItemState> {
        WorkItemState::ALL
            .into_iter()
            .find(|state| self.path_for(slot, *state).exists())
    }

    /// Every work item file in slot order. Files not named `<n>.<state>` are ignored.
    pub fn items(&self) -> Result<Vec<WorkItem>, SequencerError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut items = Vec::new();
        let entries = fs::read_dir(&self.dir).map_err(|e| SequencerError::io(&self.dir, e))?;
        for entry in entries {
            let path = entry.map_err(|e| SequencerError::io(&self.dir, e))?.path();
            if !path.is_file() {
                continue;
            }
            let slot = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse::<u32>().ok());
            let state = path
                .extension()
                .and_then(|e| e.to_str())
                .and_then(WorkItemState::from_extension);
            if let (Some(slot), Some(state)) = (slot, state) {
                items.push(WorkItem { slot, state, path });
            }
        }
        items.sort_by_key(|item| item.slot);
        Ok(items)
    }

    /// Pending items in increasing slot order.
    pub fn pending(&self) -> Result<Vec<WorkItem>, SequencerError> {
        Ok(self
            .items()?
            .into_iter()
            .filter(|item| item.state == WorkItemState::Pending)
            .collect())
    }

    /// Materialize a pending item in `slot` unless the slot is already claimed.
    pub fn create(&self, slot: u32, rows: &[WorkRow]) -> Result<bool, SequencerError> {
        if let Some(state) = self.state_of(slot) {
            debug!(dir = %self.dir.display(), slot, ?state, "Slot already claimed");
            return Ok(false);
        }
        let path = self.path_for(slot, WorkItemState::Pending);
        write_table(&path, &WORK_ITEM_HEADER, rows.iter().map(WorkRow::fields))?;
        Ok(true)
    }

    /// Move an item to another state by renaming its file.
    pub fn transition(&self, item: &WorkItem, to: WorkItemState) -> Result<WorkItem, SequencerError> {
        let target = self.path_for(item.slot, to);
        if item.state != to {
            fs::rename(&item.path, &target).map_err(|e| SequencerError::io(&item.path, e))?;
            debug!(from = %item.path.display(), to = %target.display(), "Work item transitioned");
        }
        Ok(WorkItem {
            slot: item.slot,
            state: to,
            path: target,
        })
    }
}

/// Partition directories holding work items of one quality, in key order.
pub fn lane_partitions(
    partitions_dir: &Path,
    quality: Quality,
) -> Result<Vec<PartitionKey>, SequencerError> {
    if !partitions_dir.exists() {
        return Ok(Vec::new());
    }
    let mut keys = Vec::new();
    let entries =
        fs::read_dir(partitions_dir).map_err(|e| SequencerError::io(partitions_dir, e))?;
    for entry in entries {
        let path = entry.map_err(|e| SequencerError::io(partitions_dir, e))?.path();
        if !path.is_dir() {
            continue;
        }
        let key = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.parse::<PartitionKey>().ok());
        if let Some(key) = key.filter(|k| k.quality == quality) {
            keys.push(key);
        }
    }
    keys.sort();
    Ok(keys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn work_row(hash: &str) -> WorkRow {
        WorkRow {
            title: "F1 2025 R07 Race 1080p".to_string(),
            info_hash: hash.to_string(),
            magnet: format!("magnet:?xt=urn:btih:{hash}"),
        }
    }

    #[test]
    fn test_extension_mapping() {
        for state in WorkItemState::ALL {
            assert_eq!(WorkItemState::from_extension(state.extension()), Some(state));
        }
        assert_eq!(WorkItemState::from_extension("txt"), None);
    }

    #[test]
    fn test_create_and_read_back() {
        let dir = TempDir::new().unwrap();
        let slots = WorkSlots::new(dir.path().join("2025r07FHD"));
        assert!(slots.create(1, &[work_row("aaa")]).unwrap());

        let text = fs::read_to_string(slots.path_for(1, WorkItemState::Pending)).unwrap();
        assert!(text.starts_with("title,infoHash,magnet\n"));

        let items = slots.pending().unwrap();
        assert_eq!(items.len(), 1);
        let (rows, malformed) = items[0].rows().unwrap();
        assert_eq!(malformed, 0);
        assert_eq!(rows, vec![work_row("aaa")]);
    }

    #[test]
    fn test_claimed_slot_is_not_recreated() {
        let dir = TempDir::new().unwrap();
        let slots = WorkSlots::new(dir.path());
        fs::write(slots.path_for(2, WorkItemState::Archived), "x").unwrap();
        fs::write(slots.path_for(3, WorkItemState::Stale), "x").unwrap();

        assert!(!slots.create(2, &[work_row("b")]).unwrap());
        assert!(!slots.create(3, &[work_row("c")]).unwrap());
        assert!(!slots.path_for(2, WorkItemState::Pending).exists());
        assert_eq!(slots.state_of(2), Some(WorkItemState::Archived));
        assert_eq!(slots.state_of(4), None);
    }

    #[test]
    fn test_items_sorted_numerically() {
        let dir = TempDir::new().unwrap();
        let slots = WorkSlots::new(dir.path());
        for slot in [10, 2, 1] {
            slots.create(slot, &[work_row("h")]).unwrap();
        }
        fs::write(dir.path().join("notes.txt"), "x").unwrap();
        fs::write(dir.path().join("x.csv"), "x").unwrap();

        let order: Vec<u32> = slots.items().unwrap().iter().map(|i| i.slot).collect();
        assert_eq!(order, vec![1, 2, 10]);
    }

    #[test]
    fn test_transition_renames() {
        let dir = TempDir::new().unwrap();
        let slots = WorkSlots::new(dir.path());
        slots.create(5, &[work_row("h")]).unwrap();
        let item = slots.pending().unwrap().remove(0);

        let archived = slots.transition(&item, WorkItemState::Archived).unwrap();
        assert_eq!(archived.state, WorkItemState::Archived);
        assert!(archived.path().exists());
        assert!(!item.path().exists());
        assert!(slots.pending().unwrap().is_empty());
    }

    #[test]
    fn test_rows_without_magnet_are_malformed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("1.csv");
        fs::write(&path, "title,infoHash,magnet\nt,h,\nt,h\nt,h,magnet:?xt=urn:btih:h\n").unwrap();
        let item = WorkSlots::new(dir.path()).pending().unwrap().remove(0);
        let (rows, malformed) = item.rows().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(malformed, 2);
    }
}
