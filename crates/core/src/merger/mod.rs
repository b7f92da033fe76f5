//! Content table to catalog fragment.

mod extract;
#[allow(clippy::module_inception)]
mod merger;
mod thumbnails;
mod title;

pub use extract::{extension, file_name, PathRules};
pub use merger::{MergeReport, Merger};
pub use thumbnails::Thumbnails;
pub use title::TitleBuilder;

use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::CatalogError;
use crate::tables::TableError;

/// How episode numbers are assigned within a lane.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EpisodePolicy {
    /// A counter per round, in content table order.
    #[default]
    PerRound,
    /// One counter across every round.
    Global,
    /// `NN - ` file name prefixes verbatim; the rest continue after the
    /// round's highest prefix.
    NumericPrefix,
}

#[derive(Debug, Error)]
pub enum MergeError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Table(#[from] TableError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl MergeError {
    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}
