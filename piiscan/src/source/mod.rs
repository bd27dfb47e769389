//! Image enumeration.
//!
//! A source produces the complete, bounded list of images for one batch
//! before any processing starts. Local files are read later by the extractor;
//! remote objects are fetched later by the batch processor. Enumeration only
//! hands out names and locations.

mod local;
mod remote;
mod s3;
mod sigv4;

use std::collections::HashSet;

use crate::config::BatchConfig;
use crate::error::{PiiScanError, Result};
use crate::models::ImageRef;

pub use local::LocalDirectory;
pub use remote::{BucketStore, RemoteListing};
pub use s3::S3BucketStore;

/// File extensions (lowercase) accepted from a local directory.
pub const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp"];

pub enum ImageSource {
    Local(LocalDirectory),
    Remote(RemoteListing),
}

impl ImageSource {
    pub fn kind(&self) -> &'static str {
        match self {
            ImageSource::Local(_) => "local",
            ImageSource::Remote(_) => "remote",
        }
    }

    /// List every image in the source, with names unique within the batch.
    pub async fn enumerate(&self, config: &BatchConfig) -> Result<Vec<ImageRef>> {
        let images = match self {
            ImageSource::Local(dir) => dir.enumerate().await?,
            ImageSource::Remote(listing) => listing.enumerate().await?,
        };

        if images.len() > config.max_items {
            return Err(PiiScanError::BatchTooLarge {
                found: images.len(),
                limit: config.max_items,
            });
        }

        let images = unique_names(images);
        tracing::info!(source = self.kind(), count = images.len(), "Enumerated images");
        Ok(images)
    }
}

impl From<LocalDirectory> for ImageSource {
    fn from(dir: LocalDirectory) -> Self {
        ImageSource::Local(dir)
    }
}

impl From<RemoteListing> for ImageSource {
    fn from(listing: RemoteListing) -> Self {
        ImageSource::Remote(listing)
    }
}

/// Suffix repeated names with `~2`, `~3`, ... in enumeration order.
fn unique_names(images: Vec<ImageRef>) -> Vec<ImageRef> {
    let mut taken: HashSet<String> = images.iter().map(|i| i.name().to_string()).collect();
    let mut seen: HashSet<String> = HashSet::new();

    images
        .into_iter()
        .map(|image| {
            if seen.insert(image.name().to_string()) {
                return image;
            }
            let mut n = 2;
            let renamed = loop {
                let candidate = format!("{}~{n}", image.name());
                if !taken.contains(&candidate) {
                    break candidate;
                }
                n += 1;
            };
            taken.insert(renamed.clone());
            seen.insert(renamed.clone());
            image.renamed(renamed)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_unique_names_suffixes_repeats() {
        let images = vec![
            ImageRef::local("a.png", "/x/a.png"),
            ImageRef::local("a.png", "/y/a.png"),
            ImageRef::local("a.png~2", "/z/a.png~2"),
            ImageRef::local("a.png", "/w/a.png"),
        ];
        let names: Vec<String> = unique_names(images)
            .iter()
            .map(|i| i.name().to_string())
            .collect();
        assert_eq!(names, vec!["a.png", "a.png~3", "a.png~2", "a.png~4"]);
    }

    #[tokio::test]
    async fn test_enumerate_enforces_max_items() {
        let dir = TempDir::new().unwrap();
        for name in ["a.png", "b.png", "c.png"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        let source = ImageSource::from(LocalDirectory::new(dir.path()));

        let config = BatchConfig {
            max_items: 2,
            ..BatchConfig::default()
        };
        let err = source.enumerate(&config).await.unwrap_err();
        assert!(matches!(
            err,
            PiiScanError::BatchTooLarge { found: 3, limit: 2 }
        ));

        let images = source.enumerate(&BatchConfig::default()).await.unwrap();
        assert_eq!(images.len(), 3);
    }
}
