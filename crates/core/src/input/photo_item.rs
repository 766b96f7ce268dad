use std::path::{Path, PathBuf};

/// One input photo: where it lives and how to show it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoItem {
    path: PathBuf,
    name: String,
}

impl PhotoItem {
    /// Builds an item whose display name is the file name of `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self { path, name }
    }

    pub fn with_name(path: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Display for PhotoItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}
