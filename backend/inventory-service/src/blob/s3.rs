//! S3-compatible blob store
use super::BlobStore;
use crate::config::Config;
use crate::error::BlobError;
use async_trait::async_trait;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use tracing::{debug, info};

#[derive(Clone)]
pub struct S3BlobStore {
    client: Client,
    bucket: String,
    public_base_url: String,
}

impl S3BlobStore {
    pub fn new(client: Client, bucket: impl Into<String>, public_base_url: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            public_base_url: public_base_url.into(),
        }
    }

    /// Build a client from the default credential chain plus the blob settings in `config`
    pub async fn from_config(config: &Config) -> Result<Self, BlobError> {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = &config.blob_region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let Some(endpoint) = &config.blob_endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let sdk_config = loader.load().await;

        // Custom endpoints (MinIO and friends) only support path-style addressing
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(config.blob_endpoint.is_some())
            .build();
        let client = Client::from_conf(s3_config);

        let region = sdk_config
            .region()
            .map(|r| r.to_string())
            .unwrap_or_else(|| "us-east-1".to_string());
        let public_base_url = public_base_url(config, &region)?;

        info!(bucket = %config.blob_bucket, base_url = %public_base_url, "Blob store initialized");
        Ok(Self::new(client, &config.blob_bucket, public_base_url))
    }

    pub fn object_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url.trim_end_matches('/'), key)
    }
}

fn public_base_url(config: &Config, region: &str) -> Result<String, BlobError> {
    if config.blob_bucket.is_empty() {
        return Err(BlobError::Config("bucket name is empty".into()));
    }
    Ok(match (&config.blob_public_base_url, &config.blob_endpoint) {
        (Some(base), _) => base.clone(),
        (None, Some(endpoint)) => {
            format!("{}/{}", endpoint.trim_end_matches('/'), config.blob_bucket)
        }
        (None, None) => format!("https://{}.s3.{}.amazonaws.com", config.blob_bucket, region),
    })
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<String, BlobError> {
        let size = body.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| BlobError::Upload {
                key: key.to_string(),
                message: aws_sdk_s3::error::DisplayErrorContext(&e).to_string(),
            })?;

        debug!(key = %key, size, "Blob uploaded");
        Ok(self.object_url(key))
    }
}
