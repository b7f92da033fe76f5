use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::dates::normalize_date;
use super::parser::parse_feed;
use super::{FeedEntry, FeedError, FeedFetcher, FeedItem, SourceGroup};
use crate::config::{DateFallback, HarvesterConfig};
use crate::magnet;
use crate::metrics;
use crate::tables::Ledger;

/// Counts for one harvest pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HarvestReport {
    pub groups: usize,
    /// Groups where some endpoint produced at least one entry.
    pub groups_served: usize,
    pub endpoint_failures: usize,
    pub entries_seen: usize,
    pub accepted: usize,
    pub duplicates: usize,
    /// Entries failing the keyword or year filter.
    pub filtered: usize,
    pub missing_guid: usize,
}

/// Pulls feed groups, filters entries and appends new ones to the ledger.
pub struct Harvester {
    fetcher: Arc<dyn FeedFetcher>,
    keywords: Vec<String>,
    year: String,
    date_fallback: DateFallback,
}

impl Harvester {
    pub fn new(config: &HarvesterConfig, fetcher: Arc<dyn FeedFetcher>) -> Self {
        Self {
            fetcher,
            keywords: config
                .keywords
                .iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
            year: config.year.clone(),
            date_fallback: config.date_fallback,
        }
    }

    /// Keyword (any, case-insensitive) and literal year, both required.
    pub fn accepts(&self, title: &str) -> bool {
        let lower = title.to_lowercase();
        self.keywords.iter().any(|k| lower.contains(k.as_str())) && title.contains(&self.year)
    }

    /// Turn a raw entry into a ledger item, or `None` if it has no usable guid.
    pub fn normalize(&self, entry: &FeedEntry) -> Option<FeedItem> {
        let title = entry.title.as_deref()?.trim();
        let magnet = entry.magnet();
        let guid = derive_guid(entry, magnet)?;
        let link = magnet
            .or(entry.link.as_deref())
            .unwrap_or_default()
            .trim()
            .to_string();

        Some(FeedItem {
            title: title.to_string(),
            link,
            guid,
            published_at: normalize_date(
                entry.published.as_deref(),
                self.date_fallback,
                &self.year,
            ),
        })
    }

    /// Harvest every group into `ledger`.
    ///
    /// Endpoints of a group are tried in order until one yields at least one
    /// parseable entry. Only failure to read the ledger is an error.
    pub async fn harvest(
        &self,
        groups: &[SourceGroup],
        ledger: &Ledger,
    ) -> Result<HarvestReport, FeedError> {
        let mut known = ledger.known_guids()?;
        info!(known = known.len(), fetcher = self.fetcher.name(), "Starting harvest");

        let mut report = HarvestReport {
            groups: groups.len(),
            ..Default::default()
        };

        for group in groups {
            let Some(entries) = self.fetch_group(group, &mut report).await else {
                info!(group = %group.name, "No endpoint produced entries");
                continue;
            };
            report.groups_served += 1;

            let items = self.select(&entries, &mut known, &mut report);
            let rows: Vec<_> = items.iter().map(FeedItem::to_ledger_row).collect();
            let added = ledger.append(&rows)?;
            report.accepted += added;
            info!(group = %group.name, seen = entries.len(), added, "Group harvested");
        }

        metrics::FEED_ENTRIES
            .with_label_values(&["accepted"])
            .inc_by(report.accepted as u64);
        metrics::FEED_ENTRIES
            .with_label_values(&["duplicate"])
            .inc_by(report.duplicates as u64);
        metrics::FEED_ENTRIES
            .with_label_values(&["filtered"])
            .inc_by(report.filtered as u64);
        metrics::FEED_ENTRIES
            .with_label_values(&["no_guid"])
            .inc_by(report.missing_guid as u64);

        Ok(report)
    }

    async fn fetch_group(
        &self,
        group: &SourceGroup,
        report: &mut HarvestReport,
    ) -> Option<Vec<FeedEntry>> {
        for (endpoint, url) in group.endpoints.iter().enumerate() {
            let result = match self.fetcher.fetch(url).await {
                Ok(body) => parse_feed(&body),
                Err(e) => Err(e),
            };
            match result {
                Ok(entries) if !entries.is_empty() => return Some(entries),
                Ok(_) => {
                    warn!(group = %group.name, endpoint, "Endpoint returned no entries");
                }
                Err(e) => {
                    warn!(group = %group.name, endpoint, error = %e, "Endpoint failed");
                }
            }
            report.endpoint_failures += 1;
            metrics::FEED_ENDPOINT_FAILURES.inc();
        }
        None
    }

    fn select(
        &self,
        entries: &[FeedEntry],
        known: &mut HashSet<String>,
        report: &mut HarvestReport,
    ) -> Vec<FeedItem> {
        let mut items = Vec::new();
        for entry in entries {
            report.entries_seen += 1;
            let Some(title) = entry.title.as_deref() else {
                report.filtered += 1;
                continue;
            };
            if !self.accepts(title) {
                report.filtered += 1;
                continue;
            }
            let Some(item) = self.normalize(entry) else {
                debug!(title = %title, "No guid derivable, skipping");
                report.missing_guid += 1;
                continue;
            };
            if !known.insert(item.guid.clone()) {
                report.duplicates += 1;
                continue;
            }
            items.push(item);
        }
        items
    }
}

/// guid, then id, then a non-magnet link, then the magnet's info-hash.
/// URL-shaped identifiers collapse to their final path segment.
fn derive_guid(entry: &FeedEntry, magnet: Option<&str>) -> Option<String> {
    let candidates = [
        entry.guid.as_deref(),
        entry.id.as_deref(),
        entry.link.as_deref().filter(|l| !magnet::is_magnet(l)),
    ];
    candidates
        .into_iter()
        .flatten()
        .map(collapse_url)
        .find(|g| !g.is_empty())
        .or_else(|| magnet.and_then(magnet::info_hash))
}

fn collapse_url(raw: &str) -> String {
    let raw = raw.trim();
    if raw.starts_with("http") {
        raw.trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string()
    } else {
        raw.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config_from_str;
    use crate::testing::{fixtures, MockFeedFetcher};
    use tempfile::TempDir;

    fn config() -> HarvesterConfig {
        load_config_from_str(
            r#"
[harvester]
keywords = ["Formula 1", "Formula.1"]
year = "2025"
date_fallback = "epoch"
"#,
        )
        .unwrap()
        .harvester
    }

    fn entry(title: &str) -> FeedEntry {
        FeedEntry {
            title: Some(title.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_accepts_requires_keyword_and_year() {
        let h = Harvester::new(&config(), Arc::new(MockFeedFetcher::new()));
        assert!(h.accepts("Formula.1.2025.R07.British.Grand.Prix.1080p"));
        assert!(h.accepts("FORMULA 1 2025 Round 3"));
        assert!(!h.accepts("Formula 1 2024 Round 3"));
        assert!(!h.accepts("MotoGP 2025 Round 3"));
    }

    #[test]
    fn test_guid_chain() {
        let mut e = entry("x");
        e.guid = Some("g".into());
        e.id = Some("i".into());
        e.link = Some("https://t.example/l".into());
        assert_eq!(derive_guid(&e, None).as_deref(), Some("g"));

        e.guid = None;
        assert_eq!(derive_guid(&e, None).as_deref(), Some("i"));

        e.id = None;
        assert_eq!(derive_guid(&e, None).as_deref(), Some("l"));

        e.link = Some("magnet:?xt=urn:btih:HASH1&dn=x".into());
        let magnet = e.magnet();
        assert_eq!(derive_guid(&e, magnet).as_deref(), Some("HASH1"));
    }

    #[test]
    fn test_url_guid_collapses() {
        assert_eq!(collapse_url("https://tracker.example/torrent/12345"), "12345");
        assert_eq!(collapse_url("https://tracker.example/torrent/12345/"), "12345");
        assert_eq!(collapse_url("urn:uuid:991"), "urn:uuid:991");
    }

    #[test]
    fn test_normalize_prefers_magnet_link_and_epoch_date() {
        let h = Harvester::new(&config(), Arc::new(MockFeedFetcher::new()));
        let mut e = entry("Formula 1 2025 R01 1080p");
        e.guid = Some("https://tracker.example/t/77".into());
        e.link = Some("https://tracker.example/t/77".into());
        e.enclosure = Some("magnet:?xt=urn:btih:abc".into());
        e.published = Some("not a date".into());

        let item = h.normalize(&e).unwrap();
        assert_eq!(item.guid, "77");
        assert_eq!(item.link, "magnet:?xt=urn:btih:abc");
        assert_eq!(item.to_ledger_row().pub_date, "01 Jan 2025 00:00:00 +0000");
    }

    #[tokio::test]
    async fn test_harvest_falls_back_and_dedups() {
        let dir = TempDir::new().unwrap();
        let (ledger, _) = Ledger::open(dir.path().join("ledger.csv")).unwrap();

        let fetcher = Arc::new(MockFeedFetcher::new());
        fetcher.fail("https://a1.example/rss").await;
        fetcher.set_body(
            "https://a2.example/rss",
            fixtures::rss_feed(&[
                fixtures::rss_item(
                    "Formula.1.2025.R07.British.Grand.Prix.1080p",
                    "abc123",
                    "Sun, 06 Jul 2025 14:00:00 +0000",
                ),
                fixtures::rss_item("MotoGP 2025 Round 9", "moto", ""),
            ]),
        )
        .await;
        fetcher.set_body(
            "https://a3.example/rss",
            fixtures::rss_feed(&[fixtures::rss_item("Formula 1 2025 R08", "never", "")]),
        )
        .await;
        fetcher.set_body(
            "https://b.example/rss",
            fixtures::rss_feed(&[fixtures::rss_item(
                "Formula.1.2025.R07.British.Grand.Prix.1080p",
                "abc123",
                "",
            )]),
        )
        .await;

        let groups = vec![
            SourceGroup {
                name: "Source A".into(),
                endpoints: vec![
                    "https://a1.example/rss".into(),
                    "https://a2.example/rss".into(),
                    "https://a3.example/rss".into(),
                ],
            },
            SourceGroup {
                name: "Source B".into(),
                endpoints: vec!["https://b.example/rss".into()],
            },
        ];

        let harvester = Harvester::new(&config(), fetcher.clone());
        let report = harvester.harvest(&groups, &ledger).await.unwrap();

        assert_eq!(report.groups_served, 2);
        assert_eq!(report.endpoint_failures, 1);
        assert_eq!(report.accepted, 1);
        assert_eq!(report.filtered, 1);
        assert_eq!(report.duplicates, 1);
        assert!(!fetcher.was_fetched("https://a3.example/rss").await);

        let (rows, _) = ledger.rows().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].guid, "abc123");
        assert_eq!(rows[0].pub_date, "06 Jul 2025 14:00:00 +0000");

        // A second pass adds nothing.
        let again = harvester.harvest(&groups, &ledger).await.unwrap();
        assert_eq!(again.accepted, 0);
        assert_eq!(ledger.rows().unwrap().0.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_feed_tries_next_endpoint() {
        let dir = TempDir::new().unwrap();
        let (ledger, _) = Ledger::open(dir.path().join("ledger.csv")).unwrap();
        let fetcher = Arc::new(MockFeedFetcher::new());
        fetcher.set_body("https://empty.example", fixtures::rss_feed(&[])).await;
        fetcher.set_body(
            "https://full.example",
            fixtures::rss_feed(&[fixtures::rss_item("Formula 1 2025 R02 SD", "h2", "")]),
        )
        .await;

        let groups = vec![SourceGroup {
            name: "Source".into(),
            endpoints: vec!["https://empty.example".into(), "https://full.example".into()],
        }];
        let report = Harvester::new(&config(), fetcher)
            .harvest(&groups, &ledger)
            .await
            .unwrap();
        assert_eq!(report.endpoint_failures, 1);
        assert_eq!(report.accepted, 1);
    }
}
