use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::warn;

/// `{"countries": {country: url}, "calendar": {round: country}}`
#[derive(Debug, Default, Deserialize)]
struct ThumbnailFile {
    #[serde(default)]
    countries: HashMap<String, String>,
    #[serde(default)]
    calendar: HashMap<String, String>,
}

/// Round number to thumbnail URL, with a default for every miss.
#[derive(Debug, Clone)]
pub struct Thumbnails {
    by_round: HashMap<u8, String>,
    default: String,
}

impl Thumbnails {
    /// Only the default image.
    pub fn empty(default: impl Into<String>) -> Self {
        Self {
            by_round: HashMap::new(),
            default: default.into(),
        }
    }

    /// Load the mapping file. A missing file or bad JSON degrades to
    /// [`Thumbnails::empty`].
    pub fn load(path: Option<&Path>, default: &str) -> Self {
        let Some(path) = path else {
            return Self::empty(default);
        };
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Thumbnail mapping unavailable");
                return Self::empty(default);
            }
        };
        match Self::from_json(&text, default) {
            Ok(thumbnails) => thumbnails,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Thumbnail mapping is not valid JSON");
                Self::empty(default)
            }
        }
    }

    pub fn from_json(text: &str, default: &str) -> Result<Self, serde_json::Error> {
        let file: ThumbnailFile = serde_json::from_str(text)?;
        let by_round = file
            .calendar
            .iter()
            .filter_map(|(round, country)| {
                let round = round.trim().parse::<u8>().ok()?;
                let url = file.countries.get(country)?;
                Some((round, url.clone()))
            })
            .collect();
        Ok(Self {
            by_round,
            default: default.to_string(),
        })
    }

    pub fn for_round(&self, round: u8) -> &str {
        self.by_round
            .get(&round)
            .map(String::as_str)
            .unwrap_or(&self.default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const DEFAULT: &str = "https://img.example/default.png";

    #[test]
    fn test_round_country_lookup() {
        let t = Thumbnails::from_json(
            r#"{
                "countries": {"Britain": "https://img.example/gb.png"},
                "calendar": {"07": "Britain", "8": "Belgium"}
            }"#,
            DEFAULT,
        )
        .unwrap();
        assert_eq!(t.for_round(7), "https://img.example/gb.png");
        // Country without an image, and a round without a country.
        assert_eq!(t.for_round(8), DEFAULT);
        assert_eq!(t.for_round(9), DEFAULT);
    }

    #[test]
    fn test_bad_sources_degrade_to_default() {
        let dir = TempDir::new().unwrap();
        let bad = dir.path().join("bad.json");
        fs::write(&bad, "{not json").unwrap();

        assert_eq!(Thumbnails::load(Some(&bad), DEFAULT).for_round(1), DEFAULT);
        assert_eq!(
            Thumbnails::load(Some(&dir.path().join("missing.json")), DEFAULT).for_round(1),
            DEFAULT
        );
        assert_eq!(Thumbnails::load(None, DEFAULT).for_round(1), DEFAULT);
    }
}
