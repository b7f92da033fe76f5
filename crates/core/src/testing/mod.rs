//! Testing utilities and mock implementations.
//!
//! Mocks for the two network seams of the pipeline, so every stage can run
//! offline against a temporary data directory.
//!
//! # Example
//!
//! ```rust,ignore
//! use formulio_core::testing::{fixtures, MockFeedFetcher, MockMetadataClient};
//!
//! let fetcher = MockFeedFetcher::new();
//! fetcher
//!     .set_body("https://feed.example/rss", fixtures::rss_feed(&[
//!         fixtures::rss_item("Formula.1.2025.R07.British.Grand.Prix.1080p", "abc123", ""),
//!     ]))
//!     .await;
//!
//! let client = MockMetadataClient::new();
//! client.add_torrent("abc123", &["Race/01.mkv", "Race/02.mkv"]).await;
//! client.hang("deadbeef").await;
//! ```

mod mock_feed_fetcher;
mod mock_metadata_client;

pub use mock_feed_fetcher::MockFeedFetcher;
pub use mock_metadata_client::MockMetadataClient;

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::resolver::{ResolvedTorrent, TorrentFile};

    /// A magnet URI for `info_hash` with a display name.
    pub fn magnet(info_hash: &str, name: &str) -> String {
        format!("magnet:?xt=urn:btih:{}&dn={}", info_hash, name.replace(' ', "+"))
    }

    /// An RSS `<item>` whose link is a magnet and whose guid is the hash.
    ///
    /// An empty `pub_date` leaves the element out.
    pub fn rss_item(title: &str, info_hash: &str, pub_date: &str) -> String {
        let mut item = format!(
            "<item><title>{}</title><link>{}</link><guid isPermaLink=\"false\">{}</guid>",
            escape(title),
            escape(&magnet(info_hash, title)),
            escape(info_hash),
        );
        if !pub_date.is_empty() {
            item.push_str(&format!("<pubDate>{}</pubDate>", escape(pub_date)));
        }
        item.push_str("</item>");
        item
    }

    /// An RSS 2.0 document holding `items`.
    pub fn rss_feed(items: &[String]) -> String {
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <rss version=\"2.0\"><channel><title>Mock tracker</title>\
             <link>https://tracker.example</link>{}</channel></rss>",
            items.concat()
        )
    }

    /// A descriptor with one 1 GiB file per path, in the given order.
    pub fn resolved_torrent(info_hash: &str, files: &[&str]) -> ResolvedTorrent {
        ResolvedTorrent {
            info_hash: info_hash.to_ascii_lowercase(),
            name: files
                .first()
                .and_then(|f| f.split('/').next())
                .map(|s| s.to_string()),
            files: files
                .iter()
                .map(|path| TorrentFile {
                    path: path.to_string(),
                    length: 1 << 30,
                })
                .collect(),
        }
    }

    fn escape(text: &str) -> String {
        text.replace('&', "&amp;")
            .replace('<', "&lt;")
            .replace('>', "&gt;")
    }
}
