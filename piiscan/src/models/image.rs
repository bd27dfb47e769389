use std::path::{Path, PathBuf};

use url::Url;

/// Where an enumerated image's bytes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageLocation {
    /// Read lazily from disk when the item is processed
    Local { path: PathBuf },
    /// Fetched over HTTP during the FETCH stage
    Remote { bucket: String, url: Url },
}

/// One image in a batch. Immutable once enumerated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    name: String,
    location: ImageLocation,
}

impl ImageRef {
    pub fn local(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            location: ImageLocation::Local { path: path.into() },
        }
    }

    pub fn remote(name: impl Into<String>, bucket: impl Into<String>, url: Url) -> Self {
        Self {
            name: name.into(),
            location: ImageLocation::Remote {
                bucket: bucket.into(),
                url,
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn location(&self) -> &ImageLocation {
        &self.location
    }

    pub fn local_path(&self) -> Option<&Path> {
        match &self.location {
            ImageLocation::Local { path } => Some(path),
            ImageLocation::Remote { .. } => None,
        }
    }

    pub fn bucket(&self) -> Option<&str> {
        match &self.location {
            ImageLocation::Local { .. } => None,
            ImageLocation::Remote { bucket, .. } => Some(bucket),
        }
    }

    pub(crate) fn renamed(self, name: String) -> Self {
        Self { name, ..self }
    }
}
