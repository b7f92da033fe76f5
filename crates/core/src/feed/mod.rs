//! Feed harvesting: source groups, RSS/Atom parsing and the ledger append.

mod dates;
mod harvester;
mod http;
mod parser;
mod sources;
mod types;

pub use dates::{normalize_date, parse_feed_date};
pub use harvester::{HarvestReport, Harvester};
pub use http::HttpFeedFetcher;
pub use parser::parse_feed;
pub use sources::{encode_endpoint, load_sources, parse_sources};
pub use types::*;
