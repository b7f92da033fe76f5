//! Catalog fragments and the reloadable serving snapshot.
//!
//! The merger writes one [`CatalogFragment`] per lane. The server holds a
//! [`CatalogStore`] that swaps in a fresh immutable [`CatalogSnapshot`]
//! whenever a fragment's modification time changes.

mod fragment;
mod snapshot;
mod types;

pub use fragment::CatalogFragment;
pub use snapshot::{CatalogSnapshot, CatalogStore, CatalogVideo, LaneCatalog, ReloadReport};
pub use types::*;
