use std::fs;
use std::path::{Path, PathBuf};

use crate::input::photo_item::PhotoItem;
use crate::input::photo_source::{PhotoSource, SourceError};
use crate::shared::constants::IMAGE_EXTENSIONS;

/// Lists the supported images directly inside one directory.
///
/// Subdirectories are not descended into. Entries are sorted by file name so
/// repeated runs see the same order regardless of the filesystem's listing
/// order.
pub struct DirectoryPhotoSource {
    dir: PathBuf,
}

impl DirectoryPhotoSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl PhotoSource for DirectoryPhotoSource {
    fn photos(&self) -> Result<Vec<PhotoItem>, SourceError> {
        if !self.dir.exists() {
            return Err(SourceError::NotFound(self.dir.clone()));
        }
        if !self.dir.is_dir() {
            return Err(SourceError::NotADirectory(self.dir.clone()));
        }

        let read_err = |source: std::io::Error| SourceError::Read {
            path: self.dir.clone(),
            source,
        };

        let mut paths = Vec::new();
        for entry in fs::read_dir(&self.dir).map_err(read_err)? {
            let path = entry.map_err(read_err)?.path();
            if path.is_file() && is_image(&path) {
                paths.push(path);
            }
        }
        paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

        log::debug!("Found {} photos in {}", paths.len(), self.dir.display());
        Ok(paths.into_iter().map(PhotoItem::new).collect())
    }
}

pub fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}
