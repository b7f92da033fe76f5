use chrono::{DateTime, FixedOffset};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::{append_rows, read_table, write_table, TableError};

pub const LEDGER_HEADER: [&str; 4] = ["title", "link", "guid", "pubDate"];

/// Timestamp layout of the `pubDate` column (ledger and partition files).
pub const LEDGER_DATE_FORMAT: &str = "%d %b %Y %H:%M:%S %z";

/// One row of the ledger or of a partition file (same four columns).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerRow {
    pub title: String,
    pub link: String,
    pub guid: String,
    pub pub_date: String,
}

impl LedgerRow {
    /// Build from raw CSV fields. Rows with fewer than four columns are malformed.
    pub fn from_fields(fields: &[String]) -> Option<Self> {
        if fields.len() < LEDGER_HEADER.len() {
            return None;
        }
        Some(Self {
            title: fields[0].clone(),
            link: fields[1].clone(),
            guid: fields[2].clone(),
            pub_date: fields[3].clone(),
        })
    }

    pub fn fields(&self) -> [&str; 4] {
        [&self.title, &self.link, &self.guid, &self.pub_date]
    }

    pub fn published_at(&self) -> Option<DateTime<FixedOffset>> {
        DateTime::parse_from_str(self.pub_date.trim(), LEDGER_DATE_FORMAT).ok()
    }
}

/// What [`Ledger::open`] found on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerState {
    /// No file yet; it will be created on first append.
    Missing,
    Valid,
    /// Header mismatch; old file kept as `.backup` and its rows migrated.
    Repaired { migrated: usize },
    /// Unreadable; old file kept as `.error` and a fresh ledger written.
    Replaced,
}

/// Append-only record of every accepted feed item.
#[derive(Debug, Clone)]
pub struct Ledger {
    path: PathBuf,
}

impl Ledger {
    /// Open the ledger, repairing its header if needed.
    pub fn open(path: impl Into<PathBuf>) -> Result<(Self, LedgerState), TableError> {
        let ledger = Self { path: path.into() };
        let state = ledger.ensure_format()?;
        Ok((ledger, state))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_format(&self) -> Result<LedgerState, TableError> {
        if !self.path.exists() {
            return Ok(LedgerState::Missing);
        }

        let table = match read_raw(&self.path) {
            Ok(rows) => rows,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Ledger unreadable, replacing it");
                let backup = sibling(&self.path, "error");
                fs::copy(&self.path, &backup).map_err(|e| TableError::io(&backup, e))?;
                write_table(&self.path, &LEDGER_HEADER, std::iter::empty::<[&str; 4]>())?;
                return Ok(LedgerState::Replaced);
            }
        };

        let mut rows = table.into_iter();
        let header = rows.next();
        if header.as_deref().is_some_and(|h| *h == LEDGER_HEADER) {
            return Ok(LedgerState::Valid);
        }

        warn!(
            path = %self.path.display(),
            found = ?header,
            "Ledger header mismatch, backing up and migrating rows"
        );
        let backup = sibling(&self.path, "backup");
        fs::copy(&self.path, &backup).map_err(|e| TableError::io(&backup, e))?;

        let migrated: Vec<Vec<String>> = rows
            .map(|mut row| {
                row.resize(LEDGER_HEADER.len(), String::new());
                row
            })
            .collect();
        let count = migrated.len();
        write_table(&self.path, &LEDGER_HEADER, migrated)?;
        info!(path = %self.path.display(), migrated = count, "Ledger repaired");
        Ok(LedgerState::Repaired { migrated: count })
    }

    /// Every guid already recorded.
    pub fn known_guids(&self) -> Result<HashSet<String>, TableError> {
        read_guids(&self.path)
    }

    /// All well-formed rows plus the count of malformed ones.
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

pub(super) fn read_guids(path: &Path) -> Result<HashSet<String>, TableError> {
    let table = read_table(path)?;
    Ok(table
        .rows
        .into_iter()
        .filter_map(|mut row| (row.len() > 2).then(|| row.swap_remove(2)))
        .filter(|guid| !guid.is_empty())
        .collect())
}

pub(super) fn read_rows(path: &Path) -> Result<(Vec<LedgerRow>, usize), TableError> {
    let table = read_table(path)?;
    let mut malformed = table.malformed;
    let mut rows = Vec::with_capacity(table.rows.len());
    for fields in &table.rows {
        match LedgerRow::from_fields(fields) {
            Some(row) => rows.push(row),
            None => malformed += 1,
        }
    }
    Ok((rows, malformed))
}

/// Read every physical record, header included, with no column-count checks.
fn read_raw(path: &Path) -> Result<Vec<Vec<String>>, TableError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(|e| TableError::csv(path, e))?;
    reader
        .records()
        .map(|r| {
            r.map(|rec| rec.iter().map(str::to_string).collect())
                .map_err(|e| TableError::csv(path, e))
        })
        .collect()
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}
