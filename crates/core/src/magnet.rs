//! Magnet URI helpers.

/// Extract the info-hash following `btih:` in a magnet URI.
///
/// The hash is the run of ASCII alphanumerics after the marker, so both hex
/// (40 chars) and base32 (32 chars) encodings are returned as found.
pub fn info_hash(uri: &str) -> Option<String> {
    let lower = uri.to_ascii_lowercase();
    let start = lower.find("btih:")? + "btih:".len();
    let hash: String = uri[start..]
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect();
    (!hash.is_empty()).then_some(hash)
}

pub fn is_magnet(uri: &str) -> bool {
    uri.trim_start().to_ascii_lowercase().starts_with("magnet:")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_info_hash_hex() {
        let uri = "magnet:?xt=urn:btih:0123456789ABCDEF0123456789abcdef01234567&dn=F1";
        assert_eq!(
            info_hash(uri).as_deref(),
            Some("0123456789ABCDEF0123456789abcdef01234567")
        );
    }

    #[test]
    fn test_info_hash_case_insensitive_marker() {
        assert_eq!(info_hash("magnet:?xt=urn:BTIH:abc123").as_deref(), Some("abc123"));
    }

    #[test]
    fn test_info_hash_missing() {
        assert!(info_hash("https://example.org/torrent/42").is_none());
        assert!(info_hash("magnet:?xt=urn:btih:&dn=empty").is_none());
    }

    #[test]
    fn test_is_magnet() {
        assert!(is_magnet("magnet:?xt=urn:btih:abc"));
        assert!(is_magnet("  MAGNET:?xt"));
        assert!(!is_magnet("https://example.org"));
    }
}
