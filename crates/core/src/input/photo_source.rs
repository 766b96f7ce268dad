use std::path::PathBuf;

use thiserror::Error;

use crate::input::photo_item::PhotoItem;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("input directory not found: {0}")]
    NotFound(PathBuf),
    #[error("input is not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Supplies the ordered batch of photos for one run.
///
/// The returned order is the processing order, and clustering results depend
/// on it, so implementations must be stable across calls.
pub trait PhotoSource: Send {
    fn photos(&self) -> Result<Vec<PhotoItem>, SourceError>;
}

impl PhotoSource for Vec<PhotoItem> {
    fn photos(&self) -> Result<Vec<PhotoItem>, SourceError> {
        Ok(self.clone())
    }
}
