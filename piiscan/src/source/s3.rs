use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use crate::config::RemoteConfig;
use crate::error::{PiiScanError, Result};

use super::remote::BucketStore;
use super::sigv4::{encode_key, encode_query, Signer, EMPTY_PAYLOAD_SHA256};

const LISTING_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Deserialize)]
struct ListAllMyBucketsResult {
    #[serde(rename = "Buckets", default)]
    buckets: BucketList,
}

#[derive(Debug, Default, Deserialize)]
struct BucketList {
    #[serde(rename = "Bucket", default)]
    bucket: Vec<BucketEntry>,
}

#[derive(Debug, Deserialize)]
struct BucketEntry {
    #[serde(rename = "Name")]
    name: String,
}

#[derive(Debug, Deserialize)]
struct ListBucketResult {
    #[serde(rename = "Contents", default)]
    contents: Vec<ObjectEntry>,
    #[serde(rename = "IsTruncated", default)]
    is_truncated: bool,
    #[serde(rename = "NextContinuationToken", default)]
    next_continuation_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ObjectEntry {
    #[serde(rename = "Key")]
    key: String,
}

/// S3 (or S3-compatible) bucket listing over the REST API.
///
/// Listing calls are header-signed; the object URLs it returns are presigned
/// so they can be fetched without credentials.
pub struct S3BucketStore {
    client: Client,
    signer: Signer,
    region: String,
    endpoint: Option<Url>,
    presign_expiry_secs: u64,
}

impl S3BucketStore {
    pub fn new(config: RemoteConfig) -> Result<Self> {
        if config.access_key.is_empty() || config.secret_key.is_empty() {
            return Err(PiiScanError::Config(
                "S3 access key and secret key are required".to_string(),
            ));
        }

        let endpoint = config
            .endpoint
            .as_deref()
            .map(Url::parse)
            .transpose()?;

        let client = Client::builder()
            .timeout(Duration::from_secs(LISTING_TIMEOUT_SECS))
            .build()
            .map_err(|e| PiiScanError::Connection(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            signer: Signer::new(&config),
            region: config.region,
            endpoint,
            presign_expiry_secs: config.presign_expiry_secs,
        })
    }

    fn service_url(&self) -> Result<Url> {
        match &self.endpoint {
            Some(endpoint) => {
                let mut url = endpoint.clone();
                url.set_path("/");
                url.set_query(None);
                Ok(url)
            }
            None => Ok(Url::parse(&format!(
                "https://s3.{}.amazonaws.com/",
                self.region
            ))?),
        }
    }

    /// Custom endpoints use path-style addressing, AWS uses virtual-hosted.
    fn bucket_url(&self, bucket: &str) -> Result<Url> {
        match &self.endpoint {
            Some(endpoint) => {
                let mut url = endpoint.clone();
                let base = endpoint.path().trim_end_matches('/');
                url.set_path(&format!("{base}/{}", urlencoding::encode(bucket)));
                url.set_query(None);
                Ok(url)
            }
            None => Ok(Url::parse(&format!(
                "https://{bucket}.s3.{}.amazonaws.com/",
                self.region
            ))?),
        }
    }

    fn object_url(&self, bucket: &str, key: &str) -> Result<Url> {
        let mut url = self.bucket_url(bucket)?;
        let path = format!("{}/{}", url.path().trim_end_matches('/'), encode_key(key));
        url.set_path(&path);
        Ok(url)
    }

    async fn signed_get(&self, mut url: Url, params: &[(String, String)]) -> Result<String> {
        if !params.is_empty() {
            url.set_query(Some(&encode_query(params)));
        }

        let headers = self
            .signer
            .sign_headers("GET", &url, &[], EMPTY_PAYLOAD_SHA256, Utc::now());

        let mut request = self.client.get(url.clone());
        for (name, value) in &headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PiiScanError::Connection(format!(
                "GET {} returned {status}: {}",
                url.path(),
                body.chars().take(200).collect::<String>()
            )));
        }

        Ok(response.text().await?)
    }
}

#[async_trait]
impl BucketStore for S3BucketStore {
    async fn list_buckets(&self) -> Result<Vec<String>> {
        let body = self.signed_get(self.service_url()?, &[]).await?;
        let parsed: ListAllMyBucketsResult = quick_xml::de::from_str(&body)?;
        let buckets: Vec<String> = parsed.buckets.bucket.into_iter().map(|b| b.name).collect();
        tracing::debug!(count = buckets.len(), "Listed buckets");
        Ok(buckets)
    }

    async fn list_object_urls(&self, bucket: &str) -> Result<Vec<Url>> {
        let mut urls = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let mut params = vec![("list-type".to_string(), "2".to_string())];
            if let Some(token) = &continuation {
                params.push(("continuation-token".to_string(), token.clone()));
            }

            let body = self.signed_get(self.bucket_url(bucket)?, &params).await?;
            let page: ListBucketResult = quick_xml::de::from_str(&body)?;

            for object in page.contents {
                if object.key.ends_with('/') {
                    continue;
                }
                let url = self.object_url(bucket, &object.key)?;
                urls.push(
                    self.signer
                        .presign(&url, self.presign_expiry_secs, Utc::now()),
                );
            }

            match (page.is_truncated, page.next_continuation_token) {
                (true, Some(token)) => continuation = Some(token),
                _ => break,
            }
        }

        tracing::debug!(bucket, count = urls.len(), "Listed objects");
        Ok(urls)
    }
}
