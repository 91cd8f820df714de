//! Blob store client
//!
//! Thumbnails are written under a deterministic key per product, so a
//! redelivered event overwrites the same object instead of adding one.

pub mod memory;
pub mod s3;

pub use memory::InMemoryBlobStore;
pub use s3::S3BlobStore;

use crate::error::BlobError;
use crate::models::RecordKey;
use async_trait::async_trait;
use bytes::Bytes;

pub const JPEG_CONTENT_TYPE: &str = "image/jpeg";

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `body` under `key`, replacing any existing object, and return its durable URL
    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<String, BlobError>;
}

/// Object key of a product's thumbnail
pub fn thumbnail_key(key: &RecordKey) -> String {
    format!("{}/thumbnails/{}_thumbnail.jpg", key.seller_id(), key.product_id())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thumbnail_key_is_deterministic() {
        let key = RecordKey::new("s1", "p2");
        assert_eq!(thumbnail_key(&key), "s1/thumbnails/p2_thumbnail.jpg");
        assert_eq!(thumbnail_key(&key), thumbnail_key(&key.clone()));
    }
}
