//! Types for feed harvesting.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use thiserror::Error;

use crate::tables::{LedgerRow, TableError, LEDGER_DATE_FORMAT};

/// Errors that can occur while harvesting feeds.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Endpoint returned status {status}")]
    Status { status: u16 },

    #[error("Feed parse error: {0}")]
    Parse(String),

    #[error("Failed to read sources file {path}: {source}")]
    Sources {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Table(#[from] TableError),
}

/// An entry exactly as found in a feed document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedEntry {
    pub title: Option<String>,
    pub link: Option<String>,
    /// RSS `<guid>`.
    pub guid: Option<String>,
    /// Atom `<id>`.
    pub id: Option<String>,
    /// `pubDate`, `published` or `updated`, first one found.
    pub published: Option<String>,
    /// RSS `<enclosure url=...>`.
    pub enclosure: Option<String>,
}

impl FeedEntry {
    /// First magnet URI among link and enclosure.
    pub fn magnet(&self) -> Option<&str> {
        [self.link.as_deref(), self.enclosure.as_deref()]
            .into_iter()
            .flatten()
            .find(|uri| crate::magnet::is_magnet(uri))
    }
}

/// A feed entry accepted by the harvester.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedItem {
    pub title: String,
    pub link: String,
    pub guid: String,
    pub published_at: DateTime<FixedOffset>,
}

impl FeedItem {
    pub fn to_ledger_row(&self) -> LedgerRow {
        LedgerRow {
            title: self.title.clone(),
            link: self.link.clone(),
            guid: self.guid.clone(),
            pub_date: self.published_at.format(LEDGER_DATE_FORMAT).to_string(),
        }
    }
}

/// A named source with fallback endpoints, tried in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceGroup {
    pub name: String,
    pub endpoints: Vec<String>,
}

/// Trait for fetching feed documents.
#[async_trait]
pub trait FeedFetcher: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Fetch the raw document at `url`.
    async fn fetch(&self, url: &str) -> Result<String, FeedError>;
}
