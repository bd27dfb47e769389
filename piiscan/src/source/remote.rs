use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use url::Url;

use crate::config::RemoteConfig;
use crate::error::{PiiScanError, Result};
use crate::models::ImageRef;

use super::s3::S3BucketStore;

/// Object storage that can list buckets and the objects inside them.
#[async_trait]
pub trait BucketStore: Send + Sync {
    async fn list_buckets(&self) -> Result<Vec<String>>;

    /// URLs the fetch stage can GET without further credentials.
    async fn list_object_urls(&self, bucket: &str) -> Result<Vec<Url>>;
}

/// Images listed from every (or a chosen set of) bucket in an object store.
pub struct RemoteListing {
    store: Arc<dyn BucketStore>,
    buckets: Vec<String>,
}

impl RemoteListing {
    /// Connect to S3 with explicit credentials.
    pub fn connect(config: RemoteConfig) -> Result<Self> {
        Ok(Self::with_store(Arc::new(S3BucketStore::new(config)?)))
    }

    pub fn with_store(store: Arc<dyn BucketStore>) -> Self {
        Self {
            store,
            buckets: Vec::new(),
        }
    }

    /// Restrict enumeration to these buckets instead of listing all of them.
    pub fn with_buckets(mut self, buckets: Vec<String>) -> Self {
        self.buckets = buckets;
        self
    }

    pub async fn enumerate(&self) -> Result<Vec<ImageRef>> {
        let buckets = if self.buckets.is_empty() {
            self.store
                .list_buckets()
                .await
                .map_err(|e| as_connection_error("Bucket listing failed", e))?
        } else {
            self.buckets.clone()
        };

        let mut listed: Vec<(String, String, Url)> = Vec::new();
        for bucket in &buckets {
            let urls = self.store.list_object_urls(bucket).await.map_err(|e| {
                as_connection_error(&format!("Object listing failed for bucket {bucket}"), e)
            })?;

            for url in urls {
                match object_name(&url) {
                    Some(name) => listed.push((bucket.clone(), name, url)),
                    None => tracing::debug!(bucket = %bucket, path = url.path(), "Skipping object without a name"),
                }
            }
        }

        if listed.is_empty() {
            return Err(PiiScanError::Empty(format!(
                "No objects listed in {} bucket(s)",
                buckets.len()
            )));
        }

        let mut buckets_per_name: HashMap<&str, HashSet<&str>> = HashMap::new();
        for (bucket, name, _) in &listed {
            buckets_per_name
                .entry(name.as_str())
                .or_default()
                .insert(bucket.as_str());
        }
        let shared: HashSet<String> = buckets_per_name
            .into_iter()
            .filter(|(_, buckets)| buckets.len() > 1)
            .map(|(name, _)| name.to_string())
            .collect();

        let images = listed
            .into_iter()
            .map(|(bucket, name, url)| {
                let name = if shared.contains(&name) {
                    format!("{bucket}/{name}")
                } else {
                    name
                };
                ImageRef::remote(name, bucket, url)
            })
            .collect();

        Ok(images)
    }
}

fn as_connection_error(context: &str, error: PiiScanError) -> PiiScanError {
    match error {
        PiiScanError::Connection(msg) => PiiScanError::Connection(format!("{context}: {msg}")),
        other => PiiScanError::Connection(format!("{context}: {other}")),
    }
}

/// Final path segment, percent-decoded.
fn object_name(url: &Url) -> Option<String> {
    let segment = url.path_segments()?.next_back()?;
    if segment.is_empty() {
        return None;
    }
    let decoded = urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| segment.to_string());
    Some(decoded)
}
