use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use crate::classifier::Quality;
use crate::merger::EpisodePolicy;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Root directory for every on-disk table, partition and fragment.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    pub harvester: HarvesterConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub lanes: Vec<LaneConfig>,
    #[serde(default)]
    pub server: ServerConfig,
}

impl Config {
    /// Resolve a path relative to `data_dir` (absolute paths pass through).
    pub fn data_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.data_dir.join(path)
        }
    }

    /// Directory holding partition files and their work item directories.
    pub fn partitions_dir(&self) -> PathBuf {
        self.data_dir.join("partitions")
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.data_path(&self.harvester.ledger_file)
    }

    pub fn sources_path(&self) -> PathBuf {
        self.data_path(&self.harvester.sources_file)
    }

    pub fn content_path(&self, lane: &LaneConfig) -> PathBuf {
        self.data_path(&lane.content_file())
    }

    pub fn catalog_path(&self, lane: &LaneConfig) -> PathBuf {
        self.data_path(&lane.catalog_file())
    }

    pub fn thumbnails_path(&self, lane: &LaneConfig) -> Option<PathBuf> {
        lane.thumbnails_file.as_ref().map(|p| self.data_path(p))
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

/// Feed harvesting configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HarvesterConfig {
    /// Case-insensitive substrings; at least one must appear in a title.
    pub keywords: Vec<String>,
    /// Literal year token that must appear in a title.
    pub year: String,
    /// File of `Source` group headers followed by base64 endpoint lines.
    #[serde(default = "default_sources_file")]
    pub sources_file: PathBuf,
    #[serde(default = "default_ledger_file")]
    pub ledger_file: PathBuf,
    /// Per-request timeout in seconds (default: 20)
    #[serde(default = "default_feed_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// What to store when a publish date cannot be decoded.
    #[serde(default)]
    pub date_fallback: DateFallback,
}

fn default_sources_file() -> PathBuf {
    PathBuf::from("feed.txt")
}

fn default_ledger_file() -> PathBuf {
    PathBuf::from("ledger.csv")
}

fn default_feed_timeout() -> u64 {
    20
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36".to_string()
}

/// Fallback timestamp for undecodable publish dates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DateFallback {
    /// The moment the entry is harvested.
    #[default]
    Now,
    /// January 1st of the configured year, midnight UTC.
    Epoch,
}

/// Classification configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClassifierConfig {
    #[serde(default)]
    pub missing_quality: MissingQualityPolicy,
    #[serde(default = "default_quality")]
    pub default_quality: Quality,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            missing_quality: MissingQualityPolicy::default(),
            default_quality: default_quality(),
        }
    }
}

fn default_quality() -> Quality {
    Quality::Sd
}

/// What the router does with a title carrying no quality token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingQualityPolicy {
    /// Route into `default_quality`.
    #[default]
    Default,
    /// Skip the row.
    Drop,
}

/// Metadata-exchange configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResolverConfig {
    /// Budget for a single magnet, in seconds (default: 30)
    #[serde(default = "default_resolve_timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub listen_port: Option<u16>,
    #[serde(default = "default_true")]
    pub enable_dht: bool,
    /// Scratch output folder handed to the session. Nothing is downloaded.
    #[serde(default = "default_session_dir")]
    pub session_dir: PathBuf,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_resolve_timeout(),
            listen_port: None,
            enable_dht: true,
            session_dir: default_session_dir(),
        }
    }
}

fn default_resolve_timeout() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

fn default_session_dir() -> PathBuf {
    PathBuf::from("session")
}

/// One quality lane: resolver scope, content table and catalog fragment.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LaneConfig {
    pub name: String,
    /// Catalog series id, e.g. `hpytt0202501`.
    pub series_id: String,
    pub quality: Quality,
    #[serde(default)]
    pub content_file: Option<PathBuf>,
    #[serde(default)]
    pub catalog_file: Option<PathBuf>,
    #[serde(default)]
    pub episode_policy: EpisodePolicy,
    /// JSON file with `countries` and `calendar` maps.
    #[serde(default)]
    pub thumbnails_file: Option<PathBuf>,
    #[serde(default = "default_thumbnail")]
    pub default_thumbnail: String,
    #[serde(default = "default_stop_words")]
    pub stop_words: Vec<String>,
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    /// Keep only the newest N rounds in the fragment.
    #[serde(default)]
    pub retain_rounds: Option<usize>,
    #[serde(default)]
    pub retire: Option<RetireConfig>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub poster: Option<String>,
}

impl LaneConfig {
    pub fn content_file(&self) -> PathBuf {
        self.content_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("content/{}.csv", self.name)))
    }

    pub fn catalog_file(&self) -> PathBuf {
        self.catalog_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("catalog/{}.json", self.name)))
    }
}

fn default_thumbnail() -> String {
    "https://i.ibb.co/yc9mg54D/un.png".to_string()
}

fn default_stop_words() -> Vec<String> {
    [
        "SkyF1HD", "SkyF1UHD", "SkyF1", "F1TV", "F1", "Formula", "Formula1", "WEB", "WEB-DL",
        "ENGLISH", "ZXX", "MULTi", "mkv", "mp4",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_extensions() -> Vec<String> {
    vec!["mkv".to_string(), "mp4".to_string()]
}

/// Round retirement for a lane.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetireConfig {
    /// Newest rounds left untouched.
    #[serde(default = "default_keep_rounds")]
    pub keep_rounds: usize,
    /// Also retire the `00` catch-all round.
    #[serde(default)]
    pub retire_unknown_round: bool,
}

fn default_keep_rounds() -> usize {
    3
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
    /// How often catalog fragments are checked for changes.
    #[serde(default = "default_reload_interval")]
    pub reload_interval_secs: u64,
    /// Interval of the in-process pipeline loop (0 = disabled).
    #[serde(default)]
    pub pipeline_interval_secs: u64,
    /// Addon manifest id.
    #[serde(default = "default_addon_id")]
    pub id: String,
    #[serde(default = "default_addon_name")]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            reload_interval_secs: default_reload_interval(),
            pipeline_interval_secs: 0,
            id: default_addon_id(),
            name: default_addon_name(),
            description: String::new(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

fn default_reload_interval() -> u64 {
    30
}

fn default_addon_id() -> String {
    "org.formulio.replays".to_string()
}

fn default_addon_name() -> String {
    "Formulio".to_string()
}

/// Sanitized config for API responses (feed endpoints never leave the sources file)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub data_dir: PathBuf,
    pub keywords: Vec<String>,
    pub year: String,
    pub missing_quality: MissingQualityPolicy,
    pub resolver_timeout_secs: u64,
    pub lanes: Vec<SanitizedLaneConfig>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedLaneConfig {
    pub name: String,
    pub series_id: String,
    pub quality: Quality,
    pub episode_policy: EpisodePolicy,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            data_dir: config.data_dir.clone(),
            keywords: config.harvester.keywords.clone(),
            year: config.harvester.year.clone(),
            missing_quality: config.classifier.missing_quality,
            resolver_timeout_secs: config.resolver.timeout_secs,
            lanes: config
                .lanes
                .iter()
                .map(|l| SanitizedLaneConfig {
                    name: l.name.clone(),
                    series_id: l.series_id.clone(),
                    quality: l.quality,
                    episode_policy: l.episode_policy,
                })
                .collect(),
        }
    }
}
