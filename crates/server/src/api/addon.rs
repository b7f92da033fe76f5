//! Catalog addon protocol handlers.
//!
//! Only the `series` type exists. Path ids arrive with a `.json` suffix,
//! which is stripped before lookup.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use formulio_core::catalog::EpisodeKey;
use formulio_core::LaneCatalog;
use serde::Serialize;

use crate::state::AppState;

const SERIES: &str = "series";
const CATALOG_ID: &str = "formulio-series";

// ============================================================================
// Response types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub id: String,
    pub version: String,
    pub name: String,
    pub description: String,
    pub types: Vec<String>,
    pub catalogs: Vec<ManifestCatalog>,
    pub resources: Vec<ManifestResource>,
}

#[derive(Debug, Serialize)]
pub struct ManifestCatalog {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ManifestResource {
    Name(String),
    #[serde(rename_all = "camelCase")]
    Scoped {
        name: String,
        types: Vec<String>,
        id_prefixes: Vec<String>,
    },
}

#[derive(Debug, Serialize)]
pub struct MetaPreview {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poster: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CatalogResponse {
    pub metas: Vec<MetaPreview>,
}

#[derive(Debug, Serialize)]
pub struct MetaVideo {
    pub id: String,
    pub title: String,
    pub season: u8,
    pub episode: u32,
    pub thumbnail: String,
}

#[derive(Debug, Serialize)]
pub struct Meta {
    #[serde(flatten)]
    pub preview: MetaPreview,
    pub videos: Vec<MetaVideo>,
}

#[derive(Debug, Serialize)]
pub struct MetaResponse {
    pub meta: Meta,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stream {
    pub title: String,
    pub info_hash: String,
    pub file_idx: usize,
}

#[derive(Debug, Serialize)]
pub struct StreamResponse {
    pub streams: Vec<Stream>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn not_found(what: impl Into<String>) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse { error: what.into() }),
    )
}

fn bad_request(what: impl Into<String>) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse { error: what.into() }),
    )
}

/// Strip the `.json` suffix of a path id, rejecting other types.
fn series_id<'a>(kind: &str, file: &'a str) -> Result<&'a str, ApiError> {
    if kind != SERIES {
        return Err(not_found(format!("unknown type: {}", kind)));
    }
    file.strip_suffix(".json")
        .filter(|id| !id.is_empty())
        .ok_or_else(|| not_found(format!("unknown resource: {}", file)))
}

/// One entry per distinct series id, presented by its first lane.
fn series_lanes(lanes: &[LaneCatalog]) -> Vec<&LaneCatalog> {
    let mut seen = std::collections::HashSet::new();
    lanes
        .iter()
        .filter(|lane| seen.insert(lane.series_id.as_str()))
        .collect()
}

fn preview(lane: &LaneCatalog) -> MetaPreview {
    MetaPreview {
        id: lane.series_id.clone(),
        kind: SERIES.to_string(),
        name: lane.display_name.clone(),
        poster: lane.poster.clone(),
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /manifest.json
pub async fn manifest(State(state): State<Arc<AppState>>) -> Json<Manifest> {
    let server = &state.config().server;
    let prefixes: Vec<String> = series_lanes(state.store().lanes())
        .into_iter()
        .map(|lane| lane.series_id.clone())
        .collect();
    let scoped = |name: &str| ManifestResource::Scoped {
        name: name.to_string(),
        types: vec![SERIES.to_string()],
        id_prefixes: prefixes.clone(),
    };

    Json(Manifest {
        id: server.id.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        name: server.name.clone(),
        description: server.description.clone(),
        types: vec![SERIES.to_string()],
        catalogs: vec![ManifestCatalog {
            kind: SERIES.to_string(),
            id: CATALOG_ID.to_string(),
        }],
        resources: vec![
            ManifestResource::Name("catalog".to_string()),
            scoped("meta"),
            scoped("stream"),
        ],
    })
}

/// GET /catalog/series/{id}.json
pub async fn catalog(
    State(state): State<Arc<AppState>>,
    Path((kind, file)): Path<(String, String)>,
) -> Result<Json<CatalogResponse>, ApiError> {
    let id = series_id(&kind, &file)?;
    if id != CATALOG_ID {
        return Err(not_found(format!("unknown catalog: {}", id)));
    }

    let metas = series_lanes(state.store().lanes())
        .into_iter()
        .map(preview)
        .collect();
    Ok(Json(CatalogResponse { metas }))
}

/// GET /meta/series/{id}.json
///
/// Lanes sharing a series id are merged; the first video per
/// (season, episode) names the episode.
pub async fn meta(
    State(state): State<Arc<AppState>>,
    Path((kind, file)): Path<(String, String)>,
) -> Result<Json<MetaResponse>, ApiError> {
    let id = series_id(&kind, &file)?;
    let store = state.store();
    let lane = store
        .lanes_for(id)
        .into_iter()
        .next()
        .ok_or_else(|| not_found(format!("unknown series: {}", id)))?;

    let mut videos = store.videos(id).await;
    videos.dedup_by_key(|v| (v.season, v.episode));
    let videos = videos
        .into_iter()
        .map(|v| MetaVideo {
            id: EpisodeKey::new(v.season, v.episode).format(id),
            title: v.title,
            season: v.season,
            episode: v.episode,
            thumbnail: v.thumbnail,
        })
        .collect();

    Ok(Json(MetaResponse {
        meta: Meta {
            preview: preview(lane),
            videos,
        },
    }))
}

/// GET /stream/series/{series}:{season}:{episode}.json
pub async fn stream(
    State(state): State<Arc<AppState>>,
    Path((kind, file)): Path<(String, String)>,
) -> Result<Json<StreamResponse>, ApiError> {
    let id = series_id(&kind, &file)?;
    let (series, key) =
        EpisodeKey::parse(id).map_err(|_| bad_request(format!("malformed episode id: {}", id)))?;

    let store = state.store();
    if store.lanes_for(&series).is_empty() {
        return Err(not_found(format!("unknown series: {}", series)));
    }

    let streams: Vec<Stream> = store
        .streams(&series, key.round, key.episode)
        .await
        .into_iter()
        .map(|v| Stream {
            title: v.title,
            info_hash: v.info_hash,
            file_idx: v.file_idx,
        })
        .collect();
    if streams.is_empty() {
        return Err(not_found(format!("no streams for {}", id)));
    }
    Ok(Json(StreamResponse { streams }))
}
