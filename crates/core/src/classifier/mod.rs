//! Title classification and partition routing.

mod router;
mod rules;

pub use router::{Classification, RouteReport, Router};
pub use rules::{ClassificationRules, PartitionKey, Quality, QualityRule, RoundRule};
