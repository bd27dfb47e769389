#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, RgbImage};

use piiscan::classify::PatternClassifier;
use piiscan::config::{BatchConfig, ClassifierConfig, FetchConfig};
use piiscan::ocr::TextExtractor;
use piiscan::pipeline::BatchProcessor;
use piiscan::Result;

/// Encode a small solid image. The width doubles as the key the stub
/// extractor uses to pick the "recognized" text.
pub fn png_bytes(width: u32) -> Vec<u8> {
    let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, 8, image::Rgb([255, 255, 255])));
    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, ImageFormat::Png)
        .expect("Failed to encode PNG fixture");
    buffer.into_inner()
}

pub fn write_png(dir: &Path, name: &str, width: u32) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, png_bytes(width)).expect("Failed to write PNG fixture");
    path
}

pub fn write_file(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, bytes).expect("Failed to write fixture");
    path
}

/// Deterministic stand-in for an OCR engine: text is looked up by image width.
/// Unknown widths read as blank images.
#[derive(Default)]
pub struct StubExtractor {
    texts: HashMap<u32, String>,
}

impl StubExtractor {
    pub fn new(texts: &[(u32, &str)]) -> Self {
        Self {
            texts: texts
                .iter()
                .map(|(width, text)| (*width, text.to_string()))
                .collect(),
        }
    }
}

#[async_trait]
impl TextExtractor for StubExtractor {
    async fn extract_image(&self, image: &DynamicImage) -> Result<String> {
        Ok(self.texts.get(&image.width()).cloned().unwrap_or_default())
    }
}

pub fn processor_with(extractor: StubExtractor, batch: BatchConfig) -> BatchProcessor {
    BatchProcessor::new(
        Arc::new(extractor),
        Arc::new(
            PatternClassifier::new(&ClassifierConfig::default())
                .expect("Failed to build classifier"),
        ),
        &batch,
        &FetchConfig::default(),
    )
    .expect("Failed to build processor")
}

pub fn processor(extractor: StubExtractor) -> BatchProcessor {
    processor_with(extractor, BatchConfig::default())
}
