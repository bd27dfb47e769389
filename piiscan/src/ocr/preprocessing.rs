use std::io::Cursor;
use std::path::Path;

use image::{DynamicImage, GenericImageView, ImageFormat, ImageReader};

use crate::error::{PiiScanError, Result};

/// Decode raw bytes into a validated image.
///
/// The format is sniffed from the content, not from a file extension, so
/// mislabelled files still decode when their bytes are a supported image.
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage> {
    if bytes.is_empty() {
        return Err(PiiScanError::Decode("Image payload is empty".to_string()));
    }

    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| PiiScanError::Decode(format!("Failed to read image: {e}")))?;

    if reader.format().is_none() {
        return Err(PiiScanError::Decode(
            "Unrecognized image format".to_string(),
        ));
    }

    reader
        .decode()
        .map_err(|e| PiiScanError::Decode(format!("Failed to decode image: {e}")))
}

/// Decode on a blocking thread; large images are CPU-heavy to decode.
pub async fn decode_image_blocking(bytes: Vec<u8>) -> Result<DynamicImage> {
    tokio::task::spawn_blocking(move || decode_image(&bytes))
        .await
        .map_err(|e| PiiScanError::Decode(format!("Decode task panicked: {e}")))?
}

/// Read and decode an image file. Read errors are decode failures too.
pub async fn load_image(path: &Path) -> Result<DynamicImage> {
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        PiiScanError::Decode(format!("Failed to read {}: {e}", path.display()))
    })?;
    decode_image_blocking(bytes).await
}

/// Prepare a decoded image for an OCR engine
///
/// 1. Resizes images larger than `max_dimension` while keeping the aspect ratio
/// 2. Converts to grayscale
/// 3. Removes any alpha channel
/// 4. Stretches the histogram for contrast
pub fn prepare_for_ocr(image: &DynamicImage, max_dimension: u32) -> DynamicImage {
    let img = resize_if_needed(image.clone(), max_dimension);
    let img = img.grayscale();
    let img = remove_alpha(img);
    enhance_contrast(img)
}

pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut output = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut output), ImageFormat::Png)
        .map_err(|e| PiiScanError::Extraction(format!("Failed to encode image: {e}")))?;
    Ok(output)
}

/// Uses Lanczos3 for downscaling
fn resize_if_needed(img: DynamicImage, max_dim: u32) -> DynamicImage {
    let (width, height) = img.dimensions();

    if max_dim == 0 || (width <= max_dim && height <= max_dim) {
        return img;
    }

    let ratio = if width > height {
        max_dim as f32 / width as f32
    } else {
        max_dim as f32 / height as f32
    };

    let new_width = ((width as f32 * ratio) as u32).max(1);
    let new_height = ((height as f32 * ratio) as u32).max(1);

    img.resize(new_width, new_height, image::imageops::FilterType::Lanczos3)
}

fn remove_alpha(img: DynamicImage) -> DynamicImage {
    match img {
        DynamicImage::ImageRgba8(_) => DynamicImage::ImageRgb8(img.to_rgb8()),
        DynamicImage::ImageLumaA8(_) => DynamicImage::ImageLuma8(img.to_luma8()),
        _ => img,
    }
}

fn enhance_contrast(img: DynamicImage) -> DynamicImage {
    match img {
        DynamicImage::ImageLuma8(gray) => {
            DynamicImage::ImageLuma8(enhance_grayscale_contrast(gray))
        }
        DynamicImage::ImageRgb8(rgb) => {
            let gray = DynamicImage::ImageRgb8(rgb).to_luma8();
            DynamicImage::ImageLuma8(enhance_grayscale_contrast(gray))
        }
        _ => img,
    }
}

/// Maps the darkest pixel to 0 and the lightest to 255, linearly.
fn enhance_grayscale_contrast(gray: image::GrayImage) -> image::GrayImage {
    let (min_val, max_val) = gray
        .pixels()
        .fold((u8::MAX, u8::MIN), |(lo, hi), p| (lo.min(p[0]), hi.max(p[0])));

    if max_val <= min_val {
        return gray;
    }

    let range = (max_val - min_val) as f32;
    image::GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        let pixel = gray.get_pixel(x, y);
        let normalized = (pixel[0] - min_val) as f32 / range;
        image::Luma([(normalized * 255.0) as u8])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_png(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::new_rgb8(width, height);
        let mut output = Vec::new();
        img.write_to(&mut Cursor::new(&mut output), ImageFormat::Png)
            .unwrap();
        output
    }

    #[test]
    fn test_decode_valid_png() {
        let bytes = create_test_png(40, 20);
        let img = decode_image(&bytes).unwrap();
        assert_eq!(img.dimensions(), (40, 20));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let result = decode_image(&[0u8, 1, 2, 3, 4, 5]);
        assert!(matches!(result, Err(PiiScanError::Decode(_))));
    }

    #[test]
    fn test_decode_rejects_empty_payload() {
        let result = decode_image(&[]);
        assert!(matches!(result, Err(PiiScanError::Decode(_))));
    }

    #[test]
    fn test_decode_rejects_truncated_png() {
        let bytes = create_test_png(64, 64);
        let result = decode_image(&bytes[..20]);
        assert!(matches!(result, Err(PiiScanError::Decode(_))));
    }

    #[tokio::test]
    async fn test_load_image_missing_file_is_decode_error() {
        let result = load_image(Path::new("/definitely/not/here.png")).await;
        let err = result.unwrap_err();
        assert!(matches!(err, PiiScanError::Decode(_)));
        assert!(err.to_string().contains("here.png"));
    }

    #[test]
    fn test_prepare_for_ocr_outputs_grayscale() {
        let rgba = DynamicImage::new_rgba8(100, 100);
        let prepared = prepare_for_ocr(&rgba, 4096);
        assert!(matches!(prepared, DynamicImage::ImageLuma8(_)));
        assert_eq!(prepared.dimensions(), (100, 100));
    }

    #[test]
    fn test_prepare_for_ocr_downscales_large_images() {
        let wide = DynamicImage::new_rgb8(2000, 500);
        let prepared = prepare_for_ocr(&wide, 1000);
        assert_eq!(prepared.dimensions(), (1000, 250));
    }

    #[test]
    fn test_resize_if_needed_no_change() {
        let img = DynamicImage::new_rgb8(500, 500);
        let resized = resize_if_needed(img, 1000);
        assert_eq!(resized.dimensions(), (500, 500));
    }

    #[test]
    fn test_resize_if_needed_height_exceeded() {
        let img = DynamicImage::new_rgb8(500, 2000);
        let resized = resize_if_needed(img, 1000);
        assert_eq!(resized.dimensions(), (250, 1000));
    }

    #[test]
    fn test_remove_alpha_luma_a() {
        let luma_a = DynamicImage::new_luma_a8(10, 10);
        assert!(matches!(remove_alpha(luma_a), DynamicImage::ImageLuma8(_)));
    }

    #[test]
    fn test_enhance_grayscale_contrast_stretches_range() {
        let mut gray = image::GrayImage::new(10, 10);
        for (i, pixel) in gray.pixels_mut().enumerate() {
            pixel[0] = (50 + i % 90) as u8;
        }

        let enhanced = enhance_grayscale_contrast(gray);
        let min_val = enhanced.pixels().map(|p| p[0]).min().unwrap();
        let max_val = enhanced.pixels().map(|p| p[0]).max().unwrap();
        assert_eq!(min_val, 0);
        assert_eq!(max_val, 255);
    }

    #[test]
    fn test_enhance_grayscale_contrast_flat() {
        let gray = image::GrayImage::from_pixel(10, 10, image::Luma([100]));
        let enhanced = enhance_grayscale_contrast(gray);
        assert!(enhanced.pixels().all(|p| p[0] == 100));
    }

    #[test]
    fn test_encode_png_round_trips_dimensions() {
        let img = DynamicImage::new_luma8(30, 12);
        let bytes = encode_png(&img).unwrap();
        assert_eq!(decode_image(&bytes).unwrap().dimensions(), (30, 12));
    }
}
