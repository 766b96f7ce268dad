use std::path::PathBuf;

use thiserror::Error;

use crate::clustering::domain::cluster_store::Label;
use crate::input::photo_item::PhotoItem;

#[derive(Error, Debug)]
pub enum RouteError {
    #[error("failed to create bucket {path}: {source}")]
    CreateBucket {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to copy {from} to {to}: {source}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Places a classified photo into the bucket for its label.
///
/// Called at most once per item per run. Implementations must tolerate the
/// destination already holding an identical copy from an earlier run.
pub trait RoutingSink: Send {
    /// Returns where the item ended up.
    fn route(&mut self, item: &PhotoItem, label: Label) -> Result<PathBuf, RouteError>;
}

/// Bucket folder name for a label: `person_<label>`.
pub fn bucket_name(label: Label) -> String {
    format!("{}{label}", crate::shared::constants::BUCKET_PREFIX)
}
