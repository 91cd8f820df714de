//! Thumbnail processor - derives a fixed-size JPEG from a source image
//!
//! The source is scaled to cover the target canvas and center-cropped, so
//! every thumbnail has exactly the configured dimensions.
//!
//! Uses `spawn_blocking` for CPU-intensive operations to avoid blocking the async runtime.

use crate::error::{ProcessingError, Result};
use bytes::Bytes;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageOutputFormat};
use std::io::Cursor;
use std::sync::Arc;
use tracing::debug;

/// Configuration for thumbnail generation
#[derive(Clone, Debug)]
pub struct ThumbnailConfig {
    pub width: u32,
    pub height: u32,
    /// JPEG quality (1-100)
    pub quality: u8,
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            width: 100,
            height: 100,
            quality: 85,
        }
    }
}

/// Result of thumbnail generation
#[derive(Debug)]
pub struct ThumbnailResult {
    /// The thumbnail image data as JPEG
    pub data: Bytes,
    pub width: u32,
    pub height: u32,
}

/// Thumbnail processor
pub struct ThumbnailProcessor {
    config: ThumbnailConfig,
}

impl ThumbnailProcessor {
    pub fn new(config: ThumbnailConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(ThumbnailConfig::default())
    }

    pub fn config(&self) -> &ThumbnailConfig {
        &self.config
    }

    /// Generate a thumbnail from the given image data (blocking version)
    ///
    /// Deterministic: the same input bytes always produce the same output.
    pub fn generate(&self, original_data: &[u8]) -> Result<ThumbnailResult> {
        let img = image::load_from_memory(original_data)
            .map_err(|e| ProcessingError::Thumbnail(format!("Failed to decode image: {e}")))?;

        let (orig_w, orig_h) = img.dimensions();
        debug!(
            original_width = orig_w,
            original_height = orig_h,
            "Processing image for thumbnail"
        );

        let resized = img.resize_to_fill(self.config.width, self.config.height, FilterType::Triangle);
        let data = self.encode_jpeg(resized)?;

        debug!(
            width = self.config.width,
            height = self.config.height,
            size = data.len(),
            "Thumbnail generated"
        );

        Ok(ThumbnailResult {
            data,
            width: self.config.width,
            height: self.config.height,
        })
    }

    /// Generate a thumbnail on the blocking thread pool
    pub async fn generate_async(self: Arc<Self>, original_data: Bytes) -> Result<ThumbnailResult> {
        tokio::task::spawn_blocking(move || self.generate(&original_data))
            .await
            .map_err(|e| ProcessingError::Thumbnail(format!("Thumbnail task panicked: {e}")))?
    }

    /// Encode image as JPEG (alpha is dropped)
    fn encode_jpeg(&self, img: DynamicImage) -> Result<Bytes> {
        let rgb = DynamicImage::ImageRgb8(img.into_rgb8());
        let mut buf = Vec::new();
        let mut cursor = Cursor::new(&mut buf);

        rgb.write_to(&mut cursor, ImageOutputFormat::Jpeg(self.config.quality))
            .map_err(|e| ProcessingError::Thumbnail(format!("Failed to encode JPEG: {e}")))?;

        Ok(Bytes::from(buf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_fn(width, height, |x, y| {
            Rgba([(x % 256) as u8, (y % 256) as u8, 128, 255])
        });
        let mut buf = Vec::new();
        DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), ImageOutputFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn test_landscape_is_cropped_to_square() {
        let processor = ThumbnailProcessor::with_defaults();
        let result = processor.generate(&png(400, 200)).unwrap();

        assert_eq!((result.width, result.height), (100, 100));
        let decoded = image::load_from_memory(&result.data).unwrap();
        assert_eq!(decoded.dimensions(), (100, 100));
        assert_eq!(image::guess_format(&result.data).unwrap(), ImageFormat::Jpeg);
    }

    #[test]
    fn test_small_image_is_upscaled() {
        let processor = ThumbnailProcessor::new(ThumbnailConfig {
            width: 64,
            height: 48,
            quality: 70,
        });
        let result = processor.generate(&png(10, 30)).unwrap();
        let decoded = image::load_from_memory(&result.data).unwrap();
        assert_eq!(decoded.dimensions(), (64, 48));
    }

    #[test]
    fn test_output_is_deterministic() {
        let processor = ThumbnailProcessor::with_defaults();
        let source = png(250, 320);
        let a = processor.generate(&source).unwrap();
        let b = processor.generate(&source).unwrap();
        assert_eq!(a.data, b.data);
    }

    #[test]
    fn test_undecodable_bytes() {
        let processor = ThumbnailProcessor::with_defaults();
        let err = processor.generate(b"<html>not an image</html>").unwrap_err();
        assert!(matches!(err, ProcessingError::Thumbnail(_)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_generate_async() {
        let processor = Arc::new(ThumbnailProcessor::with_defaults());
        let result = processor.generate_async(Bytes::from(png(120, 90))).await.unwrap();
        assert_eq!(result.width, 100);
    }
}
