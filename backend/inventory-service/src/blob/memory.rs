//! In-memory blob store used by tests and local runs
use super::BlobStore;
use crate::error::BlobError;
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub struct StoredBlob {
    pub body: Bytes,
    pub content_type: String,
}

pub struct InMemoryBlobStore {
    base_url: String,
    objects: Mutex<HashMap<String, StoredBlob>>,
    puts: Mutex<u64>,
    failures_remaining: Mutex<u32>,
}

impl Default for InMemoryBlobStore {
    fn default() -> Self {
        Self::new("memory://blobs")
    }
}

impl InMemoryBlobStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            objects: Mutex::new(HashMap::new()),
            puts: Mutex::new(0),
            failures_remaining: Mutex::new(0),
        }
    }

    /// Make the next `count` puts fail with an upload error
    pub fn fail_next(&self, count: u32) {
        *self.failures_remaining.lock() = count;
    }

    pub fn url_for(&self, key: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), key)
    }

    pub fn get(&self, key: &str) -> Option<StoredBlob> {
        self.objects.lock().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.lock().is_empty()
    }

    /// Number of successful puts, including overwrites
    pub fn put_count(&self) -> u64 {
        *self.puts.lock()
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<String, BlobError> {
        {
            let mut failures = self.failures_remaining.lock();
            if *failures > 0 {
                *failures -= 1;
                return Err(BlobError::Upload {
                    key: key.to_string(),
                    message: "injected failure".into(),
                });
            }
        }

        self.objects.lock().insert(
            key.to_string(),
            StoredBlob {
                body,
                content_type: content_type.to_string(),
            },
        );
        *self.puts.lock() += 1;
        Ok(self.url_for(key))
    }
}
