//! Batch processing: per-image stages, failure isolation and progress.

mod fetch;
mod processor;
mod progress;

pub use fetch::ImageFetcher;
pub use processor::BatchProcessor;
pub use progress::{NoopProgress, ProgressSink, TracingProgress};
