//! Magnet metadata resolution.
//!
//! A [`MetadataClient`] fetches torrent descriptors; the [`Resolver`] drives
//! pending work items through it with a hard per-magnet timeout and records
//! every listed file in the lane's content table.

mod librqbit;
#[allow(clippy::module_inception)]
mod resolver;
mod types;

pub use librqbit::LibrqbitMetadataClient;
pub use resolver::{ResolveReport, Resolver};
pub use types::*;
