//! Mock feed fetcher for testing.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::feed::{FeedError, FeedFetcher};

/// Canned response for one URL.
#[derive(Debug, Clone)]
enum MockResponse {
    Body(String),
    Fail,
}

/// Mock implementation of the FeedFetcher trait.
///
/// URLs without a configured response fail with a 404 status, so tests only
/// set up the endpoints they care about.
#[derive(Debug)]
pub struct MockFeedFetcher {
    responses: Arc<RwLock<HashMap<String, MockResponse>>>,
    /// URLs in fetch order.
    fetched: Arc<RwLock<Vec<String>>>,
}

impl Default for MockFeedFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl MockFeedFetcher {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(RwLock::new(HashMap::new())),
            fetched: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Serve `body` for `url`.
    pub async fn set_body(&self, url: &str, body: String) {
        self.responses
            .write()
            .await
            .insert(url.to_string(), MockResponse::Body(body));
    }

    /// Make `url` fail with a transport error.
    pub async fn fail(&self, url: &str) {
        self.responses
            .write()
            .await
            .insert(url.to_string(), MockResponse::Fail);
    }

    pub async fn was_fetched(&self, url: &str) -> bool {
        self.fetched.read().await.iter().any(|u| u == url)
    }

    pub async fn fetched(&self) -> Vec<String> {
        self.fetched.read().await.clone()
    }
}

#[async_trait]
impl FeedFetcher for MockFeedFetcher {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch(&self, url: &str) -> Result<String, FeedError> {
        self.fetched.write().await.push(url.to_string());
        match self.responses.read().await.get(url) {
            Some(MockResponse::Body(body)) => Ok(body.clone()),
            Some(MockResponse::Fail) => Err(FeedError::Http("connection refused".to_string())),
            None => Err(FeedError::Status { status: 404 }),
        }
    }
}
