use std::path::{Path, PathBuf};

use crate::error::{PiiScanError, Result};
use crate::models::ImageRef;

use super::ALLOWED_EXTENSIONS;

/// Image files directly inside one directory (not recursive).
#[derive(Debug, Clone)]
pub struct LocalDirectory {
    root: PathBuf,
}

impl LocalDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub async fn enumerate(&self) -> Result<Vec<ImageRef>> {
        let is_dir = tokio::fs::metadata(&self.root)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        if !is_dir {
            return Err(PiiScanError::NotFound(format!(
                "{} is not a directory",
                self.root.display()
            )));
        }

        let mut images = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !has_image_extension(&path) {
                continue;
            }
            // Follows symlinks, so a link to an image counts as a file
            let is_file = tokio::fs::metadata(&path)
                .await
                .map(|m| m.is_file())
                .unwrap_or(false);
            if !is_file {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            images.push(ImageRef::local(name, path));
        }

        if images.is_empty() {
            return Err(PiiScanError::Empty(format!(
                "No image files found in {}",
                self.root.display()
            )));
        }

        images.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(images)
    }
}

pub(crate) fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ALLOWED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}
