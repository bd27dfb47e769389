use std::time::Duration;

use futures::StreamExt;
use reqwest::Client;
use url::Url;

use crate::config::FetchConfig;
use crate::error::{PiiScanError, Result};

/// Downloads remote image bytes for the FETCH stage.
#[derive(Clone, Debug)]
pub struct ImageFetcher {
    client: Client,
    timeout_secs: u64,
    max_bytes: u64,
}

impl ImageFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PiiScanError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            timeout_secs: config.timeout_secs,
            max_bytes: config.max_bytes,
        })
    }

    /// GET the object. Any non-2xx status, transport error, timeout or
    /// oversized body is a `PiiScanError::Fetch`.
    pub async fn fetch(&self, url: &Url) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PiiScanError::Fetch(format!("HTTP {status}")));
        }

        if let Some(length) = response.content_length() {
            if length > self.max_bytes {
                return Err(self.too_large());
            }
        }

        let mut body = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| self.transport_error(e))?;
            if (body.len() + chunk.len()) as u64 > self.max_bytes {
                return Err(self.too_large());
            }
            body.extend_from_slice(&chunk);
        }

        Ok(body)
    }

    // Presigned URLs carry credentials in the query, keep them out of messages
    fn transport_error(&self, e: reqwest::Error) -> PiiScanError {
        if e.is_timeout() {
            PiiScanError::Fetch(format!("timed out after {}s", self.timeout_secs))
        } else {
            PiiScanError::Fetch(e.without_url().to_string())
        }
    }

    fn too_large(&self) -> PiiScanError {
        PiiScanError::Fetch(format!("body exceeds {} bytes", self.max_bytes))
    }
}
