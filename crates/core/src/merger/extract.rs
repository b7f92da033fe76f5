use regex_lite::Regex;

use crate::classifier::RoundRule;

/// Round and episode extraction from a file's path inside its torrent.
///
/// Rounds: `R<n>`, `Round<sep><n>`, `<year>x<n>`, `.<NN>.<Word>.Grand.Prix`,
/// first match wins, default `00`. The episode prefix is a leading
/// `NN - ` on the file name.
#[derive(Debug, Clone)]
pub struct PathRules {
    rounds: Vec<RoundRule>,
    episode_prefix: Option<Regex>,
}

impl PathRules {
    pub fn standard() -> Self {
        let rounds = [
            ("r-number", r"(?i)(?:^|[^a-z0-9])R(\d{1,2})(?:[^0-9]|$)"),
            ("round-word", r"(?i)Round[\s._-]?(\d{1,2})(?:[^0-9]|$)"),
            ("year-x", r"(?i)(?:19|20)\d{2}x(\d{1,2})(?:[^0-9]|$)"),
            ("dotted-grand-prix", r"(?i)\.(\d{2})\.\w+\.Grand\.Prix"),
        ]
        .into_iter()
        .filter_map(|(name, p)| RoundRule::new(name, p))
        .collect();

        Self {
            rounds,
            episode_prefix: Regex::new(r"^(\d{1,3})\s*-\s*").ok(),
        }
    }

    pub fn round(&self, path: &str) -> u8 {
        self.rounds
            .iter()
            .find_map(|rule| rule.apply(path))
            .unwrap_or(0)
    }

    /// Explicit episode number from a `NN - title` file name.
    pub fn episode_prefix(&self, path: &str) -> Option<u32> {
        let re = self.episode_prefix.as_ref()?;
        re.captures(file_name(path))
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok())
            .filter(|n| *n > 0)
    }
}

impl Default for PathRules {
    fn default() -> Self {
        Self::standard()
    }
}

/// Final path segment, accepting either separator.
pub fn file_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Lower-case extension of the final path segment, if any.
pub fn extension(path: &str) -> Option<String> {
    let name = file_name(path);
    let (stem, ext) = name.rsplit_once('.')?;
    (!stem.is_empty() && !ext.is_empty()).then(|| ext.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_rules() {
        let rules = PathRules::standard();
        assert_eq!(
            rules.round("Formula.1.2025.R07.British.Grand.Prix.1080p/01.Race.mkv"),
            7
        );
        assert_eq!(rules.round("WSBK.Round.4.Race.1.mkv"), 4);
        assert_eq!(rules.round("Formula1.2025x12.Hungarian.Qualifying.SD.mp4"), 12);
        assert_eq!(
            rules.round("WorldSBK.2026.05.Czech.Grand.Prix.Race/09 - Race 2.mkv"),
            5
        );
        assert_eq!(rules.round("Season.Review.2025.mkv"), 0);
    }

    #[test]
    fn test_r_token_inside_word_is_not_a_round() {
        let rules = PathRules::standard();
        assert_eq!(rules.round("Sportscar2 Highlights.mkv"), 0);
    }

    #[test]
    fn test_episode_prefix_uses_file_name_only() {
        let rules = PathRules::standard();
        assert_eq!(rules.episode_prefix("Pack/09 - Race 2.mkv"), Some(9));
        assert_eq!(rules.episode_prefix("14-Superpole.mkv"), Some(14));
        assert_eq!(rules.episode_prefix("01 - Pack/Race.mkv"), None);
        assert_eq!(rules.episode_prefix("00 - Intro.mkv"), None);
    }

    #[test]
    fn test_path_helpers() {
        assert_eq!(file_name("a/b/c.mkv"), "c.mkv");
        assert_eq!(file_name(r"a\b\c.mkv"), "c.mkv");
        assert_eq!(file_name("c.mkv"), "c.mkv");
        assert_eq!(extension("dir/Race.MKV").as_deref(), Some("mkv"));
        assert_eq!(extension("dir/README"), None);
        assert_eq!(extension("dir/.hidden"), None);
    }
}
