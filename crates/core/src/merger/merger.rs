use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use tracing::{debug, info};

use super::extract::{extension, file_name, PathRules};
use super::thumbnails::Thumbnails;
use super::title::TitleBuilder;
use super::{EpisodePolicy, MergeError};
use crate::catalog::{CatalogEntry, CatalogFragment, EpisodeKey};
use crate::config::LaneConfig;
use crate::metrics;
use crate::tables::{ContentKey, ContentRecord, ContentTable};

/// Counts for one merge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub rows_read: usize,
    pub entries: usize,
    pub skipped_extension: usize,
    pub duplicates: usize,
    /// Repeated titles in round `00`.
    pub repeated_titles: usize,
    pub malformed: usize,
    /// Entries dropped by round retention.
    pub retired: usize,
    pub written: bool,
}

/// Builds a lane's catalog fragment from its content table.
#[derive(Debug, Clone)]
pub struct Merger {
    series_id: String,
    policy: EpisodePolicy,
    extensions: Vec<String>,
    retain_rounds: Option<usize>,
    rules: PathRules,
    titles: TitleBuilder,
    thumbnails: Thumbnails,
}

impl Merger {
    pub fn new(lane: &LaneConfig, thumbnails: Thumbnails) -> Self {
        Self {
            series_id: lane.series_id.clone(),
            policy: lane.episode_policy,
            extensions: lane
                .extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            retain_rounds: lane.retain_rounds,
            rules: PathRules::standard(),
            titles: TitleBuilder::new(&lane.stop_words),
            thumbnails,
        }
    }

    fn accepts_extension(&self, path: &str) -> bool {
        if self.extensions.is_empty() {
            return true;
        }
        extension(path).is_some_and(|ext| self.extensions.contains(&ext))
    }

    /// Build the fragment for `records`, taken in table order.
    pub fn build(&self, records: &[ContentRecord]) -> (CatalogFragment, MergeReport) {
        let mut report = MergeReport {
            rows_read: records.len(),
            ..Default::default()
        };
        let mut fragment = CatalogFragment::new(self.series_id.clone());
        let mut episodes = Episodes::new(self.policy);
        let mut seen: HashSet<ContentKey> = HashSet::new();
        let mut unknown_round_titles: HashSet<String> = HashSet::new();

        if self.policy == EpisodePolicy::NumericPrefix {
            for record in records.iter().filter(|r| self.accepts_extension(&r.path)) {
                if let Some(n) = self.rules.episode_prefix(&record.path) {
                    episodes.note_explicit(self.rules.round(&record.path), n);
                }
            }
        }

        for record in records {
            if !seen.insert(record.key()) {
                report.duplicates += 1;
                continue;
            }
            if !self.accepts_extension(&record.path) {
                debug!(path = %record.path, "Skipping file by extension");
                report.skipped_extension += 1;
                continue;
            }

            let round = self.rules.round(&record.path);
            let title = self.titles.title(&record.path);
            if round == 0 && !unknown_round_titles.insert(title.clone()) {
                report.repeated_titles += 1;
                continue;
            }

            let explicit = self.rules.episode_prefix(&record.path);
            let key = EpisodeKey::new(round, episodes.assign(round, explicit));
            let entry = CatalogEntry {
                title,
                thumbnail: self.thumbnails.for_round(round).to_string(),
                info_hash: record.info_hash.clone(),
                file_idx: record.file_idx,
                filename: file_name(&record.path).to_string(),
            };
            if fragment.insert(key, entry) {
                report.entries += 1;
            }
        }

        if let Some(keep) = self.retain_rounds {
            report.retired = fragment.retain_newest_rounds(keep);
            report.entries -= report.retired;
        }

        (fragment, report)
    }

    /// Merge the content table into `output`, writing only on change.
    pub fn merge(&self, content: &ContentTable, output: &Path) -> Result<MergeReport, MergeError> {
        let (records, malformed) = content.records()?;
        let (fragment, mut report) = self.build(&records);
        report.malformed = malformed;

        let rendered = fragment.to_json()?;
        report.written = write_if_changed(output, &rendered)?;

        let outcome = if report.written { "written" } else { "unchanged" };
        metrics::CATALOG_WRITES.with_label_values(&[outcome]).inc();
        info!(
            series = %self.series_id,
            entries = report.entries,
            written = report.written,
            "Catalog fragment merged"
        );
        Ok(report)
    }
}

/// Episode numbering state for one merge.
struct Episodes {
    policy: EpisodePolicy,
    used: HashMap<u8, HashSet<u32>>,
    next: HashMap<u8, u32>,
    next_global: u32,
}

impl Episodes {
    fn new(policy: EpisodePolicy) -> Self {
        Self {
            policy,
            used: HashMap::new(),
            next: HashMap::new(),
            next_global: 1,
        }
    }

    /// Counters of `round` start after its highest explicit number.
    fn note_explicit(&mut self, round: u8, n: u32) {
        let next = self.next.entry(round).or_insert(1);
        *next = (*next).max(n + 1);
    }

    fn assign(&mut self, round: u8, explicit: Option<u32>) -> u32 {
        let used = self.used.entry(round).or_default();
        if self.policy == EpisodePolicy::NumericPrefix {
            if let Some(n) = explicit.filter(|n| !used.contains(n)) {
                used.insert(n);
                return n;
            }
        }

        let counter = match self.policy {
            EpisodePolicy::Global => &mut self.next_global,
            EpisodePolicy::PerRound | EpisodePolicy::NumericPrefix => {
                self.next.entry(round).or_insert(1)
            }
        };
        while used.contains(counter) {
            *counter += 1;
        }
        let n = *counter;
        *counter += 1;
        used.insert(n);
        n
    }
}

/// Replace `path` with `rendered` via a temp file unless the trimmed
/// contents already match. Returns whether a write happened.
fn write_if_changed(path: &Path, rendered: &str) -> Result<bool, MergeError> {
    if let Ok(existing) = fs::read_to_string(path) {
        if existing.trim() == rendered.trim() {
            return Ok(false);
        }
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| MergeError::io(parent, e))?;
    }
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, rendered).map_err(|e| MergeError::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| MergeError::io(path, e))?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config_from_str;
    use tempfile::TempDir;

    fn lane(extra: &str) -> LaneConfig {
        let toml = format!(
            r#"
[harvester]
keywords = ["Formula 1"]
year = "2025"

[[lanes]]
name = "fhd"
series_id = "hpytt0202501"
quality = "FHD"
{extra}
"#
        );
        load_config_from_str(&toml).unwrap().lanes.remove(0)
    }

    fn record(path: &str, hash: &str, idx: usize) -> ContentRecord {
        ContentRecord {
            title: "Formula.1.2025.R07.British.Grand.Prix.1080p".to_string(),
            path: path.to_string(),
            info_hash: hash.to_string(),
            file_idx: idx,
        }
    }

    fn keys(fragment: &CatalogFragment) -> Vec<String> {
        fragment
            .entries()
            .map(|(k, _)| k.format(fragment.series_id()))
            .collect()
    }

    #[test]
    fn test_per_round_numbering() {
        let merger = Merger::new(&lane(""), Thumbnails::empty("d"));
        let (fragment, report) = merger.build(&[
            record("Formula.1.2025.R07.British.Grand.Prix.1080p/Race.mkv", "h1", 0),
            record("Formula.1.2025.R07.British.Grand.Prix.1080p/Quali.mkv", "h1", 1),
            record("Formula.1.2025.R08.Belgian.Grand.Prix.1080p/Race.mkv", "h2", 0),
        ]);
        assert_eq!(report.entries, 3);
        assert_eq!(
            keys(&fragment),
            vec!["hpytt0202501:07:01", "hpytt0202501:07:02", "hpytt0202501:08:01"]
        );
    }

    #[test]
    fn test_global_numbering() {
        let merger = Merger::new(&lane(r#"episode_policy = "global""#), Thumbnails::empty("d"));
        let (fragment, _) = merger.build(&[
            record("R07/Race.mkv", "h1", 0),
            record("R08/Race.mkv", "h2", 0),
        ]);
        assert_eq!(
            keys(&fragment),
            vec!["hpytt0202501:07:01", "hpytt0202501:08:02"]
        );
    }

    #[test]
    fn test_numeric_prefix_numbering() {
        let merger = Merger::new(
            &lane(r#"episode_policy = "numeric_prefix""#),
            Thumbnails::empty("d"),
        );
        let (fragment, _) = merger.build(&[
            record("WorldSBK.2026.05.Czech.Grand.Prix/09 - Race 2.mkv", "h", 0),
            record("WorldSBK.2026.05.Czech.Grand.Prix/Paddock Show.mkv", "h", 1),
            record("WorldSBK.2026.05.Czech.Grand.Prix/03 - Superpole.mkv", "h", 2),
            record("WorldSBK.2026.05.Czech.Grand.Prix/03 - Superpole Race.mkv", "h", 3),
        ]);
        assert_eq!(
            keys(&fragment),
            vec![
                "hpytt0202501:05:03",
                "hpytt0202501:05:09",
                "hpytt0202501:05:10",
                "hpytt0202501:05:11"
            ]
        );
        let entry = fragment.get(&EpisodeKey::new(5, 9)).unwrap();
        assert_eq!(entry.title, "Race 2");
        assert_eq!(entry.filename, "09 - Race 2.mkv");
    }

    #[test]
    fn test_filters_and_dedup() {
        let merger = Merger::new(&lane(""), Thumbnails::empty("d"));
        let (fragment, report) = merger.build(&[
            record("R07/Race.mkv", "h1", 0),
            record("R07/Race.mkv", "H1", 0),
            record("R07/sample.nfo", "h1", 1),
            record("Season Review.mkv", "h2", 0),
            record("Season Review.mp4", "h3", 0),
        ]);
        assert_eq!(report.duplicates, 1);
        assert_eq!(report.skipped_extension, 1);
        assert_eq!(report.repeated_titles, 1);
        assert_eq!(fragment.len(), 2);
    }

    #[test]
    fn test_empty_extension_list_accepts_everything() {
        let merger = Merger::new(&lane("extensions = []"), Thumbnails::empty("d"));
        let (fragment, _) = merger.build(&[record("R07/notes.txt", "h", 0)]);
        assert_eq!(fragment.len(), 1);
    }

    #[test]
    fn test_thumbnail_and_retention() {
        let thumbnails = Thumbnails::from_json(
            r#"{"countries": {"Britain": "gb.png"}, "calendar": {"07": "Britain"}}"#,
            "default.png",
        )
        .unwrap();
        let merger = Merger::new(&lane("retain_rounds = 1"), thumbnails);
        let (fragment, report) = merger.build(&[
            record("R06/Race.mkv", "h0", 0),
            record("R07/Race.mkv", "h1", 0),
        ]);
        assert_eq!(report.retired, 1);
        assert_eq!(report.entries, 1);
        assert_eq!(
            fragment.get(&EpisodeKey::new(7, 1)).unwrap().thumbnail,
            "gb.png"
        );
    }

    #[test]
    fn test_merge_writes_only_on_change() {
        let dir = TempDir::new().unwrap();
        let content = ContentTable::new(dir.path().join("content.csv"));
        content
            .append(&[record("R07/Race.mkv", "h1", 0)])
            .unwrap();
        let output = dir.path().join("catalog").join("fhd.json");
        let merger = Merger::new(&lane(""), Thumbnails::empty("d"));

        assert!(merger.merge(&content, &output).unwrap().written);
        let first = fs::read(&output).unwrap();
        let mtime = fs::metadata(&output).unwrap().modified().unwrap();

        assert!(!merger.merge(&content, &output).unwrap().written);
        assert_eq!(fs::read(&output).unwrap(), first);
        assert_eq!(fs::metadata(&output).unwrap().modified().unwrap(), mtime);

        content
            .append(&[record("R07/Quali.mkv", "h1", 1)])
            .unwrap();
        assert!(merger.merge(&content, &output).unwrap().written);
        assert!(!dir.path().join("catalog").join("fhd.json.tmp").exists());
    }
}
