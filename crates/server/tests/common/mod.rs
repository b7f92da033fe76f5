//! Common test utilities for in-process addon server tests.
//!
//! The fixture writes catalog fragments into a temporary data directory,
//! loads them into a `CatalogStore` and drives the Axum router directly.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use formulio_core::{
    catalog::{CatalogEntry, CatalogFragment, EpisodeKey},
    load_config_from_str, CatalogStore, Config,
};

/// Series served by two lanes (`fhd` and `uhd`).
pub const SHARED_SERIES: &str = "hpytt0202501";
/// Series served by the `sd` lane only.
pub const SD_SERIES: &str = "hpytt0202502";

/// Test fixture for the addon routes.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_stream_lookup() {
///     let fixture = TestFixture::new().await;
///     fixture.write_fragment("fhd", SHARED_SERIES, &[(7, 1, "Race", "abc", 0)]);
///     fixture.reload().await;
///
///     let response = fixture.get("/stream/series/hpytt0202501:07:01.json").await;
///     assert_eq!(response.status, 200);
/// }
/// ```
pub struct TestFixture {
    pub router: Router,
    pub config: Config,
    pub store: Arc<CatalogStore>,
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
    pub text: String,
}

impl TestFixture {
    pub async fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let toml = format!(
            r#"
data_dir = "{}"

[harvester]
keywords = ["Formula.1"]
year = "2025"

[server]
name = "Formulio Test"
description = "Replays"

[[lanes]]
name = "fhd"
series_id = "{shared}"
quality = "FHD"
display_name = "Sky F1 1080p"
poster = "https://img.example/fhd.jpg"

[[lanes]]
name = "uhd"
series_id = "{shared}"
quality = "4K"

[[lanes]]
name = "sd"
series_id = "{sd}"
quality = "SD"
display_name = "Sky F1 SD"
"#,
            temp_dir.path().display(),
            shared = SHARED_SERIES,
            sd = SD_SERIES,
        );
        let config = load_config_from_str(&toml).expect("Failed to parse config");

        let store = Arc::new(CatalogStore::from_config(&config));
        let state = Arc::new(formulio_server::state::AppState::new(
            config.clone(),
            Arc::clone(&store),
        ));
        let router = formulio_server::api::create_router(state);

        Self {
            router,
            config,
            store,
            temp_dir,
        }
    }

    fn fragment_path(&self, lane: &str) -> PathBuf {
        let lane = self
            .config
            .lanes
            .iter()
            .find(|l| l.name == lane)
            .expect("Unknown lane");
        self.config.catalog_path(lane)
    }

    /// Write a lane fragment from `(round, episode, title, info_hash, file_idx)` rows.
    pub fn write_fragment(&self, lane: &str, series: &str, rows: &[(u8, u32, &str, &str, usize)]) {
        let mut fragment = CatalogFragment::new(series);
        for (round, episode, title, info_hash, file_idx) in rows {
            fragment.insert(
                EpisodeKey::new(*round, *episode),
                CatalogEntry {
                    title: title.to_string(),
                    thumbnail: format!("https://img.example/{round}.png"),
                    info_hash: info_hash.to_string(),
                    file_idx: *file_idx,
                    filename: format!("{title}.mkv"),
                },
            );
        }

        let path = self.fragment_path(lane);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, fragment.to_json().unwrap()).expect("Failed to write fragment");
    }

    pub async fn reload(&self) {
        self.store.reload().await;
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let text = String::from_utf8_lossy(&body_bytes).to_string();
        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body, text }
    }
}
