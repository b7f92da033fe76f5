use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use super::ledger::{read_guids, read_rows};
use super::{append_rows, LedgerRow, TableError, LEDGER_HEADER};
use crate::classifier::PartitionKey;

/// A partition file `{dir}/{key}.csv` and its work item directory `{dir}/{key}/`.
#[derive(Debug, Clone)]
pub struct PartitionFile {
    key: PartitionKey,
    path: PathBuf,
}

impl PartitionFile {
    pub fn new(dir: &Path, key: PartitionKey) -> Self {
        let path = dir.join(format!("{key}.csv"));
        Self { key, path }
    }

    pub fn key(&self) -> &PartitionKey {
        &self.key
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory holding this partition's numbered work items.
    pub fn work_dir(&self) -> PathBuf {
        self.path.with_extension("")
    }

    /// Guids present in the file right now. Always read from disk.
    pub fn guids(&self) -> Result<HashSet<String>, TableError> {
        read_guids(&self.path)
    }

    pub fn rows(&self) -> Result<(Vec<LedgerRow>, usize), TableError> {
        read_rows(&self.path)
    }

    pub fn append(&self, rows: &[LedgerRow]) -> Result<usize, TableError> {
        if rows.is_empty() {
            return Ok(0);
        }
        append_rows(&self.path, &LEDGER_HEADER, rows.iter().map(LedgerRow::fields))
    }
}

/// Every partition file in `dir`, ordered by key. Unrelated files are ignored.
pub fn list_partitions(dir: &Path) -> Result<Vec<PartitionFile>, TableError> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut partitions = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| TableError::io(dir, e))? {
        let entry = entry.map_err(|e| TableError::io(dir, e))?;
        let path = entry.path();
        if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("csv") {
            continue;
        }
        let key = path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(|s| s.parse::<PartitionKey>().ok());
        if let Some(key) = key {
            partitions.push(PartitionFile { key, path });
        }
    }
    partitions.sort_by(|a, b| a.key.cmp(&b.key));
    Ok(partitions)
}
