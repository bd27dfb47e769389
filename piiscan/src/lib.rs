//! Batch PII detection over images.
//!
//! Enumerate images from a local directory or object storage, OCR them,
//! classify PII entities in the text and assemble a single report.
//!
//! ```rust,ignore
//! let source = ImageSource::from(LocalDirectory::new("./scans"));
//! let items = source.enumerate(&config.batch).await?;
//! let result = processor.run(items).await;
//! let artifact = assembler_for(&config.report).assemble(&result)?;
//! ```

pub mod classify;
pub mod config;
pub mod error;
pub mod models;
pub mod ocr;
pub mod pipeline;
pub mod report;
pub mod source;

pub use error::{PiiScanError, Result};
