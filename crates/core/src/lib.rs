pub mod catalog;
pub mod classifier;
pub mod config;
pub mod feed;
pub mod magnet;
pub mod merger;
pub mod metrics;
pub mod pipeline;
pub mod resolver;
pub mod sequencer;
pub mod tables;
pub mod testing;

pub use catalog::{CatalogSnapshot, CatalogStore, CatalogVideo, LaneCatalog};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, LaneConfig,
    SanitizedConfig,
};
pub use feed::{FeedFetcher, HttpFeedFetcher};
pub use pipeline::{PassReport, PipelineError, PipelineRunner};
pub use resolver::{LibrqbitMetadataClient, MetadataClient, Resolver};
