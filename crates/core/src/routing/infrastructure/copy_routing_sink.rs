use std::fs;
use std::path::PathBuf;

use crate::clustering::domain::cluster_store::Label;
use crate::input::photo_item::PhotoItem;
use crate::routing::domain::routing_sink::{bucket_name, RouteError, RoutingSink};

/// Copies each photo to `<output>/person_<label>/<file name>`.
///
/// Bucket folders are created on demand. An existing file with the same name
/// is overwritten, which makes re-running over the same input harmless.
pub struct CopyRoutingSink {
    output_dir: PathBuf,
}

impl CopyRoutingSink {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn bucket_dir(&self, label: Label) -> PathBuf {
        self.output_dir.join(bucket_name(label))
    }
}

impl RoutingSink for CopyRoutingSink {
    fn route(&mut self, item: &PhotoItem, label: Label) -> Result<PathBuf, RouteError> {
        let bucket = self.bucket_dir(label);
        fs::create_dir_all(&bucket).map_err(|e| RouteError::CreateBucket {
            path: bucket.clone(),
            source: e,
        })?;

        let dest = bucket.join(item.name());
        fs::copy(item.path(), &dest).map_err(|e| RouteError::Copy {
            from: item.path().to_path_buf(),
            to: dest.clone(),
            source: e,
        })?;
        Ok(dest)
    }
}
