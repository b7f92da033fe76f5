use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Resolution tier of a release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Quality {
    #[serde(rename = "SD", alias = "sd")]
    Sd,
    #[serde(rename = "FHD", alias = "fhd")]
    Fhd,
    #[serde(rename = "4K", alias = "4k", alias = "UHD")]
    Uhd,
}

impl Quality {
    pub fn tag(&self) -> &'static str {
        match self {
            Quality::Sd => "SD",
            Quality::Fhd => "FHD",
            Quality::Uhd => "4K",
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Quality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "SD" => Ok(Quality::Sd),
            "FHD" => Ok(Quality::Fhd),
            "4K" | "UHD" => Ok(Quality::Uhd),
            other => Err(format!("unknown quality tier '{other}'")),
        }
    }
}

/// Composite partition key, rendered as `{year}r{round:02}{quality}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartitionKey {
    pub year: String,
    /// `0` is the unknown-round bucket.
    pub round: u8,
    pub quality: Quality,
}

impl PartitionKey {
    pub fn new(year: impl Into<String>, round: u8, quality: Quality) -> Self {
        Self {
            year: year.into(),
            round,
            quality,
        }
    }

    pub fn round_tag(&self) -> String {
        format!("r{:02}", self.round)
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}r{:02}{}", self.year, self.round, self.quality)
    }
}

impl FromStr for PartitionKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || format!("invalid partition key '{s}'");
        if !s.is_ascii() || s.len() < 8 {
            return Err(invalid());
        }
        let (year, rest) = s.split_at(4);
        if !year.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let rest = rest.strip_prefix('r').ok_or_else(invalid)?;
        let (round, quality) = rest.split_at(2);
        let round = round
            .bytes()
            .all(|b| b.is_ascii_digit())
            .then(|| round.parse::<u8>().ok())
            .flatten()
            .ok_or_else(invalid)?;
        // Exact tags only: directory names are matched case-sensitively.
        let quality = match quality {
            "SD" => Quality::Sd,
            "FHD" => Quality::Fhd,
            "4K" => Quality::Uhd,
            _ => return Err(invalid()),
        };
        Ok(Self::new(year, round, quality))
    }
}

/// One round extraction attempt.
#[derive(Debug, Clone)]
pub struct RoundRule {
    pub name: &'static str,
    pattern: Regex,
}

impl RoundRule {
    pub(crate) fn new(name: &'static str, pattern: &str) -> Option<Self> {
        Regex::new(pattern).ok().map(|pattern| Self { name, pattern })
    }

    pub fn apply(&self, title: &str) -> Option<u8> {
        self.pattern
            .captures(title)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<u8>().ok())
    }
}

/// One quality extraction attempt.
#[derive(Debug, Clone)]
pub struct QualityRule {
    pub name: &'static str,
    pub quality: Quality,
    pattern: Regex,
}

impl QualityRule {
    fn new(name: &'static str, pattern: &str, quality: Quality) -> Option<Self> {
        Regex::new(pattern).ok().map(|pattern| Self {
            name,
            quality,
            pattern,
        })
    }

    pub fn apply(&self, title: &str) -> Option<Quality> {
        self.pattern.is_match(title).then_some(self.quality)
    }
}

/// Ordered extraction rules for free-text release titles.
///
/// Every list is evaluated first-match-wins:
/// - year: first `19xx`/`20xx` token bounded by non-digits; no default
///   (the row is unclassifiable);
/// - round: `R<n>`, `Round <n>`, `x<n>`, `.<NN>.`; default round `00`;
/// - quality: `2160p`/`4K`/`UHD`, `1080p`/`FHD`, `SD`, bare `HD`; no default
///   here, the router applies the configured missing-quality policy.
#[derive(Debug, Clone)]
pub struct ClassificationRules {
    year: Vec<Regex>,
    rounds: Vec<RoundRule>,
    qualities: Vec<QualityRule>,
}

impl ClassificationRules {
    pub fn standard() -> Self {
        let year = [r"(?:^|[^0-9])((?:19|20)\d{2})(?:[^0-9]|$)"]
            .iter()
            .filter_map(|p| Regex::new(p).ok())
            .collect();

        let rounds = [
            ("r-number", r"(?i)(?:^|[^a-z0-9])R(\d{1,2})(?:[^0-9]|$)"),
            ("round-word", r"(?i)Round[\s._-]?(\d{1,2})(?:[^0-9]|$)"),
            ("x-number", r"(?i)(?:^|[^a-z])x(\d{1,2})(?:[^0-9]|$)"),
            ("dotted", r"\.(\d{2})\."),
        ]
        .into_iter()
        .filter_map(|(name, p)| RoundRule::new(name, p))
        .collect();

        let qualities = [
            ("uhd", r"(?i)(?:^|[^a-z0-9])(?:2160p|4K|UHD)(?:[^a-z0-9]|$)", Quality::Uhd),
            ("fhd", r"(?i)(?:^|[^a-z0-9])(?:1080p|FHD)(?:[^a-z0-9]|$)", Quality::Fhd),
            ("sd", r"(?i)(?:^|[^a-z0-9])SD(?:[^a-z0-9]|$)", Quality::Sd),
            ("bare-hd", r"(?i)(?:^|[^a-z0-9])HD(?:[^a-z0-9]|$)", Quality::Fhd),
        ]
        .into_iter()
        .filter_map(|(name, p, q)| QualityRule::new(name, p, q))
        .collect();

        Self {
            year,
            rounds,
            qualities,
        }
    }

    pub fn year(&self, title: &str) -> Option<String> {
        self.year.iter().find_map(|re| {
            re.captures(title)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().to_string())
        })
    }

    /// Round number, `0` when no rule matches.
    pub fn round(&self, title: &str) -> u8 {
        self.rounds
            .iter()
            .find_map(|rule| rule.apply(title))
            .unwrap_or(0)
    }

    pub fn quality(&self, title: &str) -> Option<Quality> {
        self.qualities.iter().find_map(|rule| rule.apply(title))
    }

    pub fn round_rules(&self) -> &[RoundRule] {
        &self.rounds
    }

    pub fn quality_rules(&self) -> &[QualityRule] {
        &self.qualities
    }
}

impl Default for ClassificationRules {
    fn default() -> Self {
        Self::standard()
    }
}
