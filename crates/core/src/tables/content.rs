use std::collections::HashSet;
use std::path::{Path, PathBuf};

use super::{append_rows, read_table, TableError};

pub const CONTENT_HEADER: [&str; 4] = ["title", "path", "infoHash", "fileIdx"];

/// Global dedup key of the content table: lower-case info-hash and file index.
pub type ContentKey = (String, usize);

/// One file inside a resolved torrent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentRecord {
    /// Torrent label as it appeared in the feed.
    pub title: String,
    /// Relative path of the file inside the torrent.
    pub path: String,
    pub info_hash: String,
    pub file_idx: usize,
}

impl ContentRecord {
    pub fn key(&self) -> ContentKey {
        (self.info_hash.to_ascii_lowercase(), self.file_idx)
    }

    fn from_fields(fields: &[String]) -> Option<Self> {
        if fields.len() < CONTENT_HEADER.len() {
            return None;
        }
        let file_idx = fields[3].trim().parse().ok()?;
        Some(Self {
            title: fields[0].clone(),
            path: fields[1].clone(),
            info_hash: fields[2].trim().to_string(),
            file_idx,
        })
    }

    fn fields(&self) -> [String; 4] {
        [
            self.title.clone(),
            self.path.clone(),
            self.info_hash.clone(),
            self.file_idx.to_string(),
        ]
    }
}

/// The flat table of every resolved file, shared by all lanes writing to it.
#[derive(Debug, Clone)]
pub struct ContentTable {
    path: PathBuf,
}

impl ContentTable {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rows in file order plus the count of malformed ones.
    pub fn records(&self) -> Result<(Vec<ContentRecord>, usize), TableError> {
        let table = read_table(&self.path)?;
        let mut malformed = table.malformed;
        let mut records = Vec::with_capacity(table.rows.len());
        for fields in &table.rows {
            match ContentRecord::from_fields(fields) {
                Some(record) => records.push(record),
                None => malformed += 1,
            }
        }
        Ok((records, malformed))
    }

    pub fn keys(&self) -> Result<HashSet<ContentKey>, TableError> {
        let (records, _) = self.records()?;
        Ok(records.iter().map(ContentRecord::key).collect())
    }

    pub fn append(&self, records: &[ContentRecord]) -> Result<usize, TableError> {
        if records.is_empty() {
            return Ok(0);
        }
        append_rows(&self.path, &CONTENT_HEADER, records.iter().map(ContentRecord::fields))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn record(hash: &str, idx: usize) -> ContentRecord {
        ContentRecord {
            title: "Formula.1.2025.R07.British.Grand.Prix.1080p".to_string(),
            path: format!("Race/{idx:02} - Session.mkv"),
            info_hash: hash.to_string(),
            file_idx: idx,
        }
    }

    #[test]
    fn test_append_and_read_back() {
        let dir = TempDir::new().unwrap();
        let table = ContentTable::new(dir.path().join("content/fhd.csv"));
        table.append(&[record("ABC", 0), record("ABC", 1)]).unwrap();

        let text = fs::read_to_string(table.path()).unwrap();
        assert!(text.starts_with("title,path,infoHash,fileIdx\n"));

        let (records, malformed) = table.records().unwrap();
        assert_eq!(malformed, 0);
        assert_eq!(records, vec![record("ABC", 0), record("ABC", 1)]);
    }

    #[test]
    fn test_keys_are_case_insensitive_on_hash() {
        let dir = TempDir::new().unwrap();
        let table = ContentTable::new(dir.path().join("c.csv"));
        table.append(&[record("ABCDEF", 3)]).unwrap();

        let keys = table.keys().unwrap();
        assert!(keys.contains(&("abcdef".to_string(), 3)));
        assert_eq!(record("abcdef", 3).key(), record("ABCDEF", 3).key());
    }

    #[test]
    fn test_bad_index_is_malformed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("c.csv");
        fs::write(&path, "title,path,infoHash,fileIdx\nt,p,h,zero\nt,p,h,1\nt,p\n").unwrap();

        let (records, malformed) = ContentTable::new(&path).records().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(malformed, 2);
    }
}
