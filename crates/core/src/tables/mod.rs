//! Flat CSV tables shared between pipeline stages.
//!
//! Every table has a fixed header row. Readers are tolerant: a row that
//! cannot be decoded is logged and skipped, never fatal.

mod content;
mod ledger;
mod partition;

pub use content::{ContentKey, ContentRecord, ContentTable, CONTENT_HEADER};
pub use ledger::{Ledger, LedgerRow, LedgerState, LEDGER_DATE_FORMAT, LEDGER_HEADER};
pub use partition::{list_partitions, PartitionFile};

use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum TableError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("CSV error on {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

impl TableError {
    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn csv(path: &Path, source: csv::Error) -> Self {
        Self::Csv {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Rows of a table, minus the header.
#[derive(Debug, Default)]
pub struct TableRows {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
    /// Rows that could not be decoded at all.
    pub malformed: usize,
}

/// Read every row of a headed CSV file. A missing file reads as empty.
pub fn read_table(path: &Path) -> Result<TableRows, TableError> {
    if !path.exists() {
        return Ok(TableRows::default());
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(|e| TableError::csv(path, e))?;

    let header = reader
        .headers()
        .map_err(|e| TableError::csv(path, e))?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();

    let mut out = TableRows {
        header,
        ..Default::default()
    };
    for result in reader.records() {
        match result {
            Ok(record) => out.rows.push(record.iter().map(str::to_string).collect()),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping undecodable row");
                out.malformed += 1;
            }
        }
    }
    Ok(out)
}

/// Append rows, writing `header` first when the file is new or empty.
pub fn append_rows<R>(path: &Path, header: &[&str], rows: R) -> Result<usize, TableError>
where
    R: IntoIterator,
    R::Item: IntoIterator,
    <R::Item as IntoIterator>::Item: AsRef<[u8]>,
{
    ensure_parent(path)?;
    let fresh = fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| TableError::io(path, e))?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);

    if fresh {
        writer
            .write_record(header)
            .map_err(|e| TableError::csv(path, e))?;
    }

    let mut written = 0;
    for row in rows {
        writer
            .write_record(row)
            .map_err(|e| TableError::csv(path, e))?;
        written += 1;
    }
    writer.flush().map_err(|e| TableError::io(path, e))?;
    Ok(written)
}

/// Replace a file's contents with a header and rows.
pub fn write_table<R>(path: &Path, header: &[&str], rows: R) -> Result<(), TableError>
where
    R: IntoIterator,
    R::Item: IntoIterator,
    <R::Item as IntoIterator>::Item: AsRef<[u8]>,
{
    ensure_parent(path)?;
    let mut writer = csv::Writer::from_path(path).map_err(|e| TableError::csv(path, e))?;
    writer
        .write_record(header)
        .map_err(|e| TableError::csv(path, e))?;
    for row in rows {
        writer
            .write_record(row)
            .map_err(|e| TableError::csv(path, e))?;
    }
    writer.flush().map_err(|e| TableError::io(path, e))
}

pub(crate) fn ensure_parent(path: &Path) -> Result<(), TableError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|e| TableError::io(parent, e))
        }
        _ => Ok(()),
    }
}
