//! Source image fetcher
use crate::error::{ProcessingError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

#[async_trait]
pub trait ImageFetcher: Send + Sync {
    /// Download the bytes at `url`; any non-success status is a fetch error
    async fn fetch(&self, url: &str) -> Result<Bytes>;
}

/// Fetches images over HTTP(S)
#[derive(Clone)]
pub struct HttpImageFetcher {
    client: Client,
}

impl HttpImageFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("inventory-service/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProcessingError::Fetch {
                url: String::new(),
                message: format!("Failed to create HTTP client: {e}"),
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes> {
        let fetch_error = |message: String| ProcessingError::Fetch {
            url: url.to_string(),
            message,
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| fetch_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(fetch_error(format!("HTTP {status}")));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| fetch_error(format!("Failed to read body: {e}")))?;

        debug!(url = %url, size = body.len(), "Source image downloaded");
        Ok(body)
    }
}

#[derive(Clone)]
enum Scripted {
    Body(Bytes),
    Status(u16),
    Stall,
}

/// Fetcher with canned responses per URL; unknown URLs answer 404
#[derive(Default)]
pub struct ScriptedImageFetcher {
    responses: Mutex<HashMap<String, Scripted>>,
    failures: Mutex<HashMap<String, u32>>,
    calls: Mutex<HashMap<String, u32>>,
}

impl ScriptedImageFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, url: &str, body: impl Into<Bytes>) -> &Self {
        self.responses
            .lock()
            .insert(url.to_string(), Scripted::Body(body.into()));
        self
    }

    pub fn respond_status(&self, url: &str, status: u16) -> &Self {
        self.responses
            .lock()
            .insert(url.to_string(), Scripted::Status(status));
        self
    }

    /// Never answer requests to `url`
    pub fn stall(&self, url: &str) -> &Self {
        self.responses
            .lock()
            .insert(url.to_string(), Scripted::Stall);
        self
    }

    /// Answer 503 for the next `count` requests to `url`
    pub fn fail_next(&self, url: &str, count: u32) -> &Self {
        self.failures.lock().insert(url.to_string(), count);
        self
    }

    pub fn calls(&self, url: &str) -> u32 {
        self.calls.lock().get(url).copied().unwrap_or(0)
    }
}

#[async_trait]
impl ImageFetcher for ScriptedImageFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes> {
        *self.calls.lock().entry(url.to_string()).or_insert(0) += 1;

        if let Some(remaining) = self.failures.lock().get_mut(url) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(ProcessingError::Fetch {
                    url: url.to_string(),
                    message: "HTTP 503 Service Unavailable".into(),
                });
            }
        }

        let scripted = self.responses.lock().get(url).cloned();
        match scripted {
            Some(Scripted::Body(body)) => Ok(body),
            Some(Scripted::Status(status)) => Err(ProcessingError::Fetch {
                url: url.to_string(),
                message: format!("HTTP {status}"),
            }),
            Some(Scripted::Stall) => std::future::pending().await,
            None => Err(ProcessingError::Fetch {
                url: url.to_string(),
                message: "HTTP 404 Not Found".into(),
            }),
        }
    }
}
