//! Thumbnail service - fetches, derives and uploads one product thumbnail
//!
//! 1. Download the source image
//! 2. Generate the fixed-size thumbnail
//! 3. Upload it under the product's deterministic blob key
//!
//! Each I/O step is bounded by the configured timeout. Recording the URL on
//! the product record is left to the caller.

use super::fetcher::ImageFetcher;
use super::processor::ThumbnailProcessor;
use crate::blob::{thumbnail_key, BlobStore, JPEG_CONTENT_TYPE};
use crate::error::Result;
use crate::metrics;
use crate::models::RecordKey;
use resilience::with_timeout;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

pub struct ThumbnailService {
    fetcher: Arc<dyn ImageFetcher>,
    processor: Arc<ThumbnailProcessor>,
    blobs: Arc<dyn BlobStore>,
    io_timeout: Duration,
}

impl ThumbnailService {
    pub fn new(
        fetcher: Arc<dyn ImageFetcher>,
        processor: Arc<ThumbnailProcessor>,
        blobs: Arc<dyn BlobStore>,
        io_timeout: Duration,
    ) -> Self {
        Self {
            fetcher,
            processor,
            blobs,
            io_timeout,
        }
    }

    /// Generate and store the thumbnail for `key`, returning its URL
    pub async fn generate(&self, key: &RecordKey, image_url: &str) -> Result<String> {
        let started = Instant::now();

        let original = with_timeout(self.io_timeout, self.fetcher.fetch(image_url)).await??;

        let thumbnail = self.processor.clone().generate_async(original).await?;

        let blob_key = thumbnail_key(key);
        let size = thumbnail.data.len();
        let url = with_timeout(
            self.io_timeout,
            self.blobs.put(&blob_key, thumbnail.data, JPEG_CONTENT_TYPE),
        )
        .await??;

        metrics::observe_thumbnail_duration(started.elapsed().as_secs_f64());
        info!(
            seller_id = %key.seller_id(),
            product_id = %key.product_id(),
            blob_key = %blob_key,
            width = thumbnail.width,
            height = thumbnail.height,
            size,
            "Thumbnail stored"
        );

        Ok(url)
    }
}
