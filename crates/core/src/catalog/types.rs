//! Types shared by catalog fragments and snapshots.

use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur reading or writing catalog fragments.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid fragment JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid catalog key: {0}")]
    InvalidKey(String),

    #[error("No entry under key: {0}")]
    EmptyEntry(String),
}

impl CatalogError {
    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Position of an entry in a series: round (season) and episode.
///
/// Ordering is numeric, round first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EpisodeKey {
    pub round: u8,
    pub episode: u32,
}

impl EpisodeKey {
    pub fn new(round: u8, episode: u32) -> Self {
        Self { round, episode }
    }

    /// `series:RR:EE`, both numbers zero-padded to two digits.
    pub fn format(&self, series_id: &str) -> String {
        format!("{}:{:02}:{:02}", series_id, self.round, self.episode)
    }

    /// Split `series:round:episode` into the series id and the key.
    pub fn parse(key: &str) -> Result<(String, Self), CatalogError> {
        let invalid = || CatalogError::InvalidKey(key.to_string());
        let mut parts = key.rsplitn(3, ':');
        let episode = parts.next().ok_or_else(invalid)?;
        let round = parts.next().ok_or_else(invalid)?;
        let series = parts.next().filter(|s| !s.is_empty()).ok_or_else(invalid)?;
        let round = round.trim().parse().map_err(|_| invalid())?;
        let episode = episode.trim().parse().map_err(|_| invalid())?;
        Ok((series.to_string(), Self::new(round, episode)))
    }
}

/// One playable file as served to the catalog client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub title: String,
    pub thumbnail: String,
    pub info_hash: String,
    pub file_idx: usize,
    /// File name without its in-torrent folder.
    #[serde(default)]
    pub filename: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_format_and_parse() {
        let key = EpisodeKey::new(7, 2);
        assert_eq!(key.format("hpytt0202501"), "hpytt0202501:07:02");
        let (series, parsed) = EpisodeKey::parse("hpytt0202501:07:02").unwrap();
        assert_eq!(series, "hpytt0202501");
        assert_eq!(parsed, key);
        assert_eq!(EpisodeKey::parse("s:7:110").unwrap().1, EpisodeKey::new(7, 110));
    }

    #[test]
    fn test_bad_keys() {
        assert!(EpisodeKey::parse("07:02").is_err());
        assert!(EpisodeKey::parse("s:xx:02").is_err());
        assert!(EpisodeKey::parse("s:07:").is_err());
    }

    #[test]
    fn test_ordering_is_numeric() {
        let mut keys = vec![
            EpisodeKey::new(10, 1),
            EpisodeKey::new(2, 11),
            EpisodeKey::new(2, 3),
        ];
        keys.sort();
        assert_eq!(
            keys,
            vec![
                EpisodeKey::new(2, 3),
                EpisodeKey::new(2, 11),
                EpisodeKey::new(10, 1)
            ]
        );
    }

    #[test]
    fn test_entry_field_names() {
        let entry = CatalogEntry {
            title: "Race".into(),
            thumbnail: "t".into(),
            info_hash: "abc".into(),
            file_idx: 1,
            filename: "Race.mkv".into(),
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["infoHash"], "abc");
        assert_eq!(json["fileIdx"], 1);
    }
}
