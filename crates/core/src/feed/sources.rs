use std::fs;
use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::warn;

use super::{FeedError, SourceGroup};

const DEFAULT_GROUP: &str = "default";

/// Load source groups from an encoded sources file.
pub fn load_sources(path: &Path) -> Result<Vec<SourceGroup>, FeedError> {
    let text = fs::read_to_string(path).map_err(|source| FeedError::Sources {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parse_sources(&text))
}

/// Parse the sources format.
///
/// A line starting with `Source` opens a named group; every other non-empty
/// line is a base64-encoded endpoint URL for the current group. Endpoints
/// before the first header land in a group named `default`. Lines that do
/// not decode to UTF-8 are skipped.
pub fn parse_sources(text: &str) -> Vec<SourceGroup> {
    let mut groups: Vec<SourceGroup> = Vec::new();

    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.starts_with("Source") {
            groups.push(SourceGroup {
                name: line.to_string(),
                endpoints: Vec::new(),
            });
            continue;
        }

        let Some(url) = decode_endpoint(line) else {
            warn!(line = lineno + 1, "Skipping undecodable source endpoint");
            continue;
        };
        if groups.is_empty() {
            groups.push(SourceGroup {
                name: DEFAULT_GROUP.to_string(),
                endpoints: Vec::new(),
            });
        }
        if let Some(group) = groups.last_mut() {
            group.endpoints.push(url);
        }
    }

    groups
}

fn decode_endpoint(line: &str) -> Option<String> {
    let bytes = STANDARD.decode(line).ok()?;
    let url = String::from_utf8(bytes).ok()?;
    let url = url.trim();
    (!url.is_empty()).then(|| url.to_string())
}

/// Encode an endpoint the way the sources file stores it.
pub fn encode_endpoint(url: &str) -> String {
    STANDARD.encode(url.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_groups_in_order() {
        let text = format!(
            "Source A\n{}\n{}\n\nSource B\n{}\n",
            encode_endpoint("https://a1.example/rss"),
            encode_endpoint("https://a2.example/rss"),
            encode_endpoint("https://b.example/feed"),
        );
        let groups = parse_sources(&text);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].name, "Source A");
        assert_eq!(
            groups[0].endpoints,
            vec!["https://a1.example/rss", "https://a2.example/rss"]
        );
        assert_eq!(groups[1].endpoints, vec!["https://b.example/feed"]);
    }

    #[test]
    fn test_no_header_means_default_group() {
        let text = encode_endpoint("https://only.example/rss");
        let groups = parse_sources(&text);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].name, "default");
    }

    #[test]
    fn test_bad_lines_are_skipped() {
        let text = format!(
            "Source A\n!!not base64!!\n{}\n{}\n",
            STANDARD.encode([0xff, 0xfe]),
            encode_endpoint("https://ok.example/rss"),
        );
        let groups = parse_sources(&text);
        assert_eq!(groups[0].endpoints, vec!["https://ok.example/rss"]);
    }

    #[test]
    fn test_empty_group_is_kept() {
        let groups = parse_sources("Source Empty\n");
        assert_eq!(groups.len(), 1);
        assert!(groups[0].endpoints.is_empty());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = load_sources(&dir.path().join("feed.txt")).unwrap_err();
        assert!(matches!(err, FeedError::Sources { .. }));
    }
}
