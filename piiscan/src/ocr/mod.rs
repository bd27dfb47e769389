//! OCR (Optical Character Recognition) Module
//!
//! Turns one image into text. Two entry points exist because images arrive in
//! two shapes: local files that the extractor reads itself, and remote objects
//! that the batch processor has already fetched and decoded.
//!
//! # Architecture
//!
//! - `TextExtractor` trait defines the interface the batch processor calls
//! - `OcrProvider` implements it, choosing a backend from `OcrConfig.model`:
//!   - `local/tesseract` runs Tesseract via leptess
//!   - `openai/…`, `mistral/…`, `deepseek/…` call a hosted vision model
//! - A backend that cannot start leaves the provider "unavailable" instead of
//!   failing construction, so callers can check `is_available()` up front
//!
//! # Usage
//!
//! ```rust,ignore
//! let ocr = OcrProvider::new(&config.ocr)?;
//! let text = ocr.extract_path(Path::new("scan.png")).await?;
//! ```

mod api;
mod preprocessing;
mod provider;

use std::path::Path;

use async_trait::async_trait;
use image::DynamicImage;

use crate::error::Result;

pub use api::{VisionOcrClient, VisionProvider};
pub use preprocessing::{
    decode_image, decode_image_blocking, encode_png, load_image, prepare_for_ocr,
};
pub use provider::OcrProvider;

/// Extracts text from a single image.
///
/// Both entry points must produce the same text for the same decoded image.
/// No text found is `Ok(String::new())`, never an error.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Extract from an already-decoded image.
    ///
    /// Fails with `PiiScanError::Extraction` (or `OcrUnavailable`) only on
    /// engine errors.
    async fn extract_image(&self, image: &DynamicImage) -> Result<String>;

    /// Read, decode, and extract a file on disk.
    ///
    /// Read and decode problems surface as `PiiScanError::Decode`.
    async fn extract_path(&self, path: &Path) -> Result<String> {
        let image = load_image(path).await?;
        self.extract_image(&image).await
    }
}
