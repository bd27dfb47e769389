use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::classify::EntityClassifier;
use crate::config::{BatchConfig, FetchConfig};
use crate::error::{PiiScanError, Result};
use crate::models::{
    BatchProgress, BatchResult, FailureStage, ImageLocation, ImageRef, ItemStatus,
    ProcessedRecord, ProcessingFailure,
};
use crate::ocr::{decode_image_blocking, TextExtractor};

use super::fetch::ImageFetcher;
use super::progress::{NoopProgress, ProgressSink};

type ItemOutcome = std::result::Result<ProcessedRecord, ProcessingFailure>;

/// Runs FETCH → DECODE → EXTRACT → CLASSIFY over a batch of images.
///
/// One item's failure never stops the batch. Records, failures and progress
/// updates come out in enumeration order, whatever the concurrency.
pub struct BatchProcessor {
    extractor: Arc<dyn TextExtractor>,
    classifier: Arc<dyn EntityClassifier>,
    fetcher: ImageFetcher,
    concurrency: usize,
}

impl BatchProcessor {
    pub fn new(
        extractor: Arc<dyn TextExtractor>,
        classifier: Arc<dyn EntityClassifier>,
        batch: &BatchConfig,
        fetch: &FetchConfig,
    ) -> Result<Self> {
        Ok(Self {
            extractor,
            classifier,
            fetcher: ImageFetcher::new(fetch)?,
            concurrency: batch.concurrency.max(1),
        })
    }

    pub async fn run(&self, items: Vec<ImageRef>) -> BatchResult {
        self.run_with(items, &NoopProgress, &CancellationToken::new())
            .await
    }

    /// Process `items`, reporting progress after each one.
    ///
    /// Once `cancel` fires, items that have not started are counted as
    /// skipped and the partial result is returned with `cancelled` set.
    pub async fn run_with(
        &self,
        items: Vec<ImageRef>,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> BatchResult {
        let total = items.len();
        let mut result = BatchResult::new(total);
        let started = Instant::now();

        info!(total, concurrency = self.concurrency, "Starting batch");

        let mut outcomes = stream::iter(items.iter())
            .map(|item| self.process_unless_cancelled(item, cancel))
            .buffered(self.concurrency);

        while let Some(outcome) = outcomes.next().await {
            let (image_name, status) = match outcome {
                None => {
                    result.mark_skipped();
                    continue;
                }
                Some(Ok(record)) => {
                    debug!(
                        image = %record.image_name,
                        entities = record.entities.len(),
                        "Image processed"
                    );
                    let name = record.image_name.clone();
                    result.push_record(record);
                    (name, ItemStatus::Succeeded)
                }
                Some(Err(failure)) => {
                    warn!(
                        image = %failure.image_name,
                        stage = %failure.stage,
                        error = %failure.message,
                        "Image failed"
                    );
                    let name = failure.image_name.clone();
                    let stage = failure.stage;
                    result.push_failure(failure);
                    (name, ItemStatus::Failed(stage))
                }
            };

            progress.report(&BatchProgress {
                completed: result.attempted(),
                total,
                image_name,
                status,
            });
        }

        if result.cancelled {
            warn!(
                succeeded = result.succeeded,
                failed = result.failed,
                skipped = result.skipped,
                "Batch cancelled"
            );
        }
        info!(
            total,
            succeeded = result.succeeded,
            failed = result.failed,
            skipped = result.skipped,
            entities = result.entity_count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Batch complete"
        );

        result
    }

    async fn process_unless_cancelled(
        &self,
        item: &ImageRef,
        cancel: &CancellationToken,
    ) -> Option<ItemOutcome> {
        if cancel.is_cancelled() {
            return None;
        }
        Some(self.process_item(item).await)
    }

    async fn process_item(&self, item: &ImageRef) -> ItemOutcome {
        let name = item.name();

        let text = match item.location() {
            ImageLocation::Local { path } => {
                self.extractor
                    .extract_path(path)
                    .await
                    .map_err(|e| match e {
                        PiiScanError::Decode(_) => stage_failure(name, FailureStage::Decode, e),
                        other => stage_failure(name, FailureStage::Extract, other),
                    })?
            }
            ImageLocation::Remote { url, .. } => {
                let bytes = self
                    .fetcher
                    .fetch(url)
                    .await
                    .map_err(|e| stage_failure(name, FailureStage::Fetch, e))?;
                let image = decode_image_blocking(bytes)
                    .await
                    .map_err(|e| stage_failure(name, FailureStage::Decode, e))?;
                self.extractor
                    .extract_image(&image)
                    .await
                    .map_err(|e| stage_failure(name, FailureStage::Extract, e))?
            }
        };

        let entities = self
            .classifier
            .classify(&text)
            .map_err(|e| stage_failure(name, FailureStage::Classify, e))?;

        if let Some(invalid) = entities.iter().find(|e| !e.has_valid_score()) {
            return Err(ProcessingFailure::new(
                name,
                FailureStage::Classify,
                format!(
                    "{} entity has score {} outside [0, 1]",
                    invalid.entity_type, invalid.score
                ),
            ));
        }

        Ok(ProcessedRecord {
            image_name: name.to_string(),
            detected_text: text,
            entities,
        })
    }
}

fn stage_failure(name: &str, stage: FailureStage, error: PiiScanError) -> ProcessingFailure {
    let message = match error {
        PiiScanError::Fetch(msg)
        | PiiScanError::Decode(msg)
        | PiiScanError::Extraction(msg)
        | PiiScanError::Classification(msg) => msg,
        other => other.to_string(),
    };
    ProcessingFailure::new(name, stage, message)
}
