use std::collections::BTreeMap;
use std::path::Path;

use tracing::{debug, info, warn};

use super::rules::{ClassificationRules, PartitionKey, Quality};
use crate::config::{ClassifierConfig, MissingQualityPolicy};
use crate::metrics;
use crate::tables::{Ledger, LedgerRow, PartitionFile, TableError};

/// Outcome of classifying one title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Routed(PartitionKey),
    /// No year token.
    Unclassifiable,
    /// No quality token and the policy is to drop.
    MissingQuality,
}

/// Counts for one routing pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteReport {
    pub rows_read: usize,
    pub routed: usize,
    pub duplicates: usize,
    pub unclassifiable: usize,
    pub dropped_quality: usize,
    pub malformed: usize,
    /// Rows that could not be written because their partition file failed.
    pub write_failures: usize,
}

/// Routes ledger rows into partition files.
#[derive(Debug, Clone)]
pub struct Router {
    rules: ClassificationRules,
    missing_quality: MissingQualityPolicy,
    default_quality: Quality,
}

impl Router {
    pub fn new(config: &ClassifierConfig) -> Self {
        Self {
            rules: ClassificationRules::standard(),
            missing_quality: config.missing_quality,
            default_quality: config.default_quality,
        }
    }

    pub fn rules(&self) -> &ClassificationRules {
        &self.rules
    }

    pub fn classify(&self, title: &str) -> Classification {
        let Some(year) = self.rules.year(title) else {
            return Classification::Unclassifiable;
        };
        let round = self.rules.round(title);
        let quality = match (self.rules.quality(title), self.missing_quality) {
            (Some(q), _) => q,
            (None, MissingQualityPolicy::Default) => self.default_quality,
            (None, MissingQualityPolicy::Drop) => return Classification::MissingQuality,
        };
        Classification::Routed(PartitionKey::new(year, round, quality))
    }

    /// Route every ledger row to its partition file under `partitions_dir`.
    ///
    /// Partition guids are re-read from disk on every call; only an
    /// unreadable ledger is an error.
    pub fn route(&self, ledger: &Ledger, partitions_dir: &Path) -> Result<RouteReport, TableError> {
        let (rows, malformed) = ledger.rows()?;
        let mut report = RouteReport {
            rows_read: rows.len() + malformed,
            malformed,
            ..Default::default()
        };

        let mut buckets: BTreeMap<PartitionKey, Vec<LedgerRow>> = BTreeMap::new();
        for row in rows {
            if row.guid.trim().is_empty() || row.title.trim().is_empty() {
                debug!(title = %row.title, "Skipping row without guid or title");
                report.malformed += 1;
                continue;
            }
            match self.classify(&row.title) {
                Classification::Routed(key) => buckets.entry(key).or_default().push(row),
                Classification::Unclassifiable => {
                    debug!(title = %row.title, "No year token, dropping row");
                    report.unclassifiable += 1;
                }
                Classification::MissingQuality => {
                    debug!(title = %row.title, "No quality token, dropping row");
                    report.dropped_quality += 1;
                }
            }
        }

        for (key, rows) in buckets {
            let partition = PartitionFile::new(partitions_dir, key);
            match append_new(&partition, rows) {
                Ok((added, duplicates)) => {
                    if added > 0 {
                        info!(partition = %partition.key(), added, "Routed rows");
                    }
                    report.routed += added;
                    report.duplicates += duplicates;
                }
                Err((e, pending)) => {
                    warn!(partition = %partition.key(), error = %e, "Failed to write partition");
                    report.write_failures += pending;
                }
            }
        }

        let outcomes = [
            ("routed", report.routed),
            ("duplicate", report.duplicates),
            ("unclassifiable", report.unclassifiable),
            ("dropped", report.dropped_quality),
            ("malformed", report.malformed),
        ];
        for (outcome, count) in outcomes {
            metrics::PARTITION_ROWS
                .with_label_values(&[outcome])
                .inc_by(count as u64);
        }

        Ok(report)
    }
}

/// Append rows whose guid is not yet in the partition. Returns (added, duplicates).
fn append_new(
    partition: &PartitionFile,
    rows: Vec<LedgerRow>,
) -> Result<(usize, usize), (TableError, usize)> {
    let total = rows.len();
    let mut seen = partition.guids().map_err(|e| (e, total))?;
    let fresh: Vec<LedgerRow> = rows
        .into_iter()
        .filter(|row| seen.insert(row.guid.clone()))
        .collect();
    let added = fresh.len();
    partition.append(&fresh).map_err(|e| (e, added))?;
    Ok((added, total - added))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn row(title: &str, guid: &str) -> LedgerRow {
        LedgerRow {
            title: title.to_string(),
            link: format!("magnet:?xt=urn:btih:{guid}"),
            guid: guid.to_string(),
            pub_date: "13 Jun 2025 14:00:00 +0000".to_string(),
        }
    }

    fn ledger_with(dir: &TempDir, rows: &[LedgerRow]) -> Ledger {
        let (ledger, _) = Ledger::open(dir.path().join("ledger.csv")).unwrap();
        ledger.append(rows).unwrap();
        ledger
    }

    #[test]
    fn test_classify_default_policy() {
        let router = Router::new(&ClassifierConfig::default());
        assert_eq!(
            router.classify("Formula.1.2025.R07.British.Grand.Prix.1080p"),
            Classification::Routed(PartitionKey::new("2025", 7, Quality::Fhd))
        );
        assert_eq!(
            router.classify("Formula 1 2025 Testing"),
            Classification::Routed(PartitionKey::new("2025", 0, Quality::Sd))
        );
        assert_eq!(
            router.classify("Formula 1 R04 Race 2160p"),
            Classification::Unclassifiable
        );
    }

    #[test]
    fn test_classify_drop_policy() {
        let router = Router::new(&ClassifierConfig {
            missing_quality: MissingQualityPolicy::Drop,
            default_quality: Quality::Sd,
        });
        assert_eq!(
            router.classify("Formula 1 2025 Testing"),
            Classification::MissingQuality
        );
    }

    #[test]
    fn test_route_writes_partitions() {
        let dir = TempDir::new().unwrap();
        let ledger = ledger_with(
            &dir,
            &[
                row("Formula.1.2025.R07.British.Grand.Prix.1080p", "abc123"),
                row("Formula 1 2025 R07 British GP 2160p", "def456"),
                row("Formula 1 British GP", "nope"),
            ],
        );
        let parts = dir.path().join("partitions");
        let report = Router::new(&ClassifierConfig::default())
            .route(&ledger, &parts)
            .unwrap();

        assert_eq!(report.rows_read, 3);
        assert_eq!(report.routed, 2);
        assert_eq!(report.unclassifiable, 1);

        let fhd = fs::read_to_string(parts.join("2025r07FHD.csv")).unwrap();
        assert!(fhd.starts_with("title,link,guid,pubDate\n"));
        assert!(fhd.contains("abc123"));
        assert!(parts.join("2025r074K.csv").exists());
    }

    #[test]
    fn test_route_twice_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let ledger = ledger_with(
            &dir,
            &[
                row("F1 2025 R01 Race 1080p", "g1"),
                row("F1 2025 R01 Quali 1080p", "g2"),
            ],
        );
        let parts = dir.path().join("partitions");
        let router = Router::new(&ClassifierConfig::default());

        let first = router.route(&ledger, &parts).unwrap();
        assert_eq!(first.routed, 2);
        let before = fs::read_to_string(parts.join("2025r01FHD.csv")).unwrap();

        let second = router.route(&ledger, &parts).unwrap();
        assert_eq!(second.routed, 0);
        assert_eq!(second.duplicates, 2);
        let after = fs::read_to_string(parts.join("2025r01FHD.csv")).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_duplicate_guid_within_one_pass() {
        let dir = TempDir::new().unwrap();
        let ledger = ledger_with(
            &dir,
            &[row("F1 2025 R02 1080p", "same"), row("F1 2025 R02 Race 1080p", "same")],
        );
        let report = Router::new(&ClassifierConfig::default())
            .route(&ledger, &dir.path().join("p"))
            .unwrap();
        assert_eq!(report.routed, 1);
        assert_eq!(report.duplicates, 1);
    }

    #[test]
    fn test_malformed_rows_do_not_abort() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.csv");
        fs::write(
            &path,
            "title,link,guid,pubDate\nshort\nF1 2025 R03 1080p,l,g3,d\nF1 2025 R03 SD,l,,d\n",
        )
        .unwrap();
        let (ledger, _) = Ledger::open(&path).unwrap();

        let report = Router::new(&ClassifierConfig::default())
            .route(&ledger, &dir.path().join("p"))
            .unwrap();
        assert_eq!(report.malformed, 2);
        assert_eq!(report.routed, 1);
    }
}
