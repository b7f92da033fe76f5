//! Catalog addon server: HTTP routes, snapshot reload loop and metrics.

pub mod api;
pub mod metrics;
pub mod reload;
pub mod state;
