//! Configuration for inventory-service
use crate::error::ConfigError;
use serde::Deserialize;
use std::time::Duration;

/// Main configuration struct, loaded from environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // ============================================
    // Record store
    // ============================================
    /// PostgreSQL connection URL
    pub database_url: String,

    #[serde(default = "default_database_max_connections")]
    pub database_max_connections: u32,

    // ============================================
    // Event log (Kafka protocol)
    // ============================================
    #[serde(default = "default_kafka_brokers")]
    pub kafka_brokers: String,

    #[serde(default = "default_kafka_topic")]
    pub kafka_topic: String,

    /// Fixed consumer group shared by every replica
    #[serde(default = "default_kafka_group_id")]
    pub kafka_group_id: String,

    /// e.g. `SASL_SSL` for the Event Hubs Kafka endpoint
    #[serde(default)]
    pub kafka_security_protocol: Option<String>,

    #[serde(default)]
    pub kafka_sasl_mechanism: Option<String>,

    #[serde(default)]
    pub kafka_sasl_username: Option<String>,

    #[serde(default)]
    pub kafka_sasl_password: Option<String>,

    #[serde(default = "default_auto_offset_reset")]
    pub kafka_auto_offset_reset: String,

    // ============================================
    // Blob store (S3-compatible)
    // ============================================
    pub blob_bucket: String,

    #[serde(default)]
    pub blob_region: Option<String>,

    /// Custom endpoint for S3-compatible stores (MinIO, R2, ...)
    #[serde(default)]
    pub blob_endpoint: Option<String>,

    /// Base used to build public thumbnail URLs; defaults to the bucket URL
    #[serde(default)]
    pub blob_public_base_url: Option<String>,

    // ============================================
    // Thumbnails
    // ============================================
    #[serde(default = "default_thumbnail_dimension")]
    pub thumbnail_width: u32,

    #[serde(default = "default_thumbnail_dimension")]
    pub thumbnail_height: u32,

    #[serde(default = "default_thumbnail_quality")]
    pub thumbnail_quality: u8,

    // ============================================
    // Consumer loop
    // ============================================
    #[serde(default = "default_batch_max_size")]
    pub batch_max_size: usize,

    #[serde(default = "default_batch_max_wait_ms")]
    pub batch_max_wait_ms: u64,

    /// Bound for every single fetch / upload / store call
    #[serde(default = "default_io_timeout_secs")]
    pub io_timeout_secs: u64,

    /// Bound for the processing of one event as a whole
    #[serde(default = "default_event_timeout_secs")]
    pub event_timeout_secs: u64,

    #[serde(default = "default_event_max_retries")]
    pub event_max_retries: u32,

    #[serde(default = "default_retry_initial_backoff_ms")]
    pub retry_initial_backoff_ms: u64,

    #[serde(default = "default_retry_max_backoff_ms")]
    pub retry_max_backoff_ms: u64,

    #[serde(default = "default_quantity_max_conflict_retries")]
    pub quantity_max_conflict_retries: u32,

    #[serde(default = "default_reconnect_max_attempts")]
    pub reconnect_max_attempts: u32,

    #[serde(default = "default_reconnect_max_backoff_secs")]
    pub reconnect_max_backoff_secs: u64,

    // ============================================
    // HTTP (health + metrics)
    // ============================================
    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

fn default_database_max_connections() -> u32 {
    10
}

fn default_kafka_brokers() -> String {
    "localhost:9092".to_string()
}

fn default_kafka_topic() -> String {
    "inventory-events".to_string()
}

fn default_kafka_group_id() -> String {
    "$Default".to_string()
}

fn default_auto_offset_reset() -> String {
    "earliest".to_string()
}

fn default_thumbnail_dimension() -> u32 {
    100
}

fn default_thumbnail_quality() -> u8 {
    85
}

fn default_batch_max_size() -> usize {
    100
}

fn default_batch_max_wait_ms() -> u64 {
    1000
}

fn default_io_timeout_secs() -> u64 {
    10
}

fn default_event_timeout_secs() -> u64 {
    60
}

fn default_event_max_retries() -> u32 {
    3
}

fn default_retry_initial_backoff_ms() -> u64 {
    200
}

fn default_retry_max_backoff_ms() -> u64 {
    5000
}

fn default_quantity_max_conflict_retries() -> u32 {
    5
}

fn default_reconnect_max_attempts() -> u32 {
    10
}

fn default_reconnect_max_backoff_secs() -> u64 {
    60
}

fn default_http_port() -> u16 {
    8090
}

impl Config {
    /// Load configuration from environment variables and validate it
    pub fn from_env() -> Result<Self, ConfigError> {
        let config: Config = envy::from_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Load from an explicit set of key/value pairs (upper-case env names)
    pub fn from_vars<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let config: Config = envy::from_iter(vars)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database_url.trim().is_empty() {
            return Err(ConfigError::Invalid("DATABASE_URL must not be empty".into()));
        }
        if self.blob_bucket.trim().is_empty() {
            return Err(ConfigError::Invalid("BLOB_BUCKET must not be empty".into()));
        }
        if self.batch_max_size == 0 {
            return Err(ConfigError::Invalid("BATCH_MAX_SIZE must be > 0".into()));
        }
        if self.io_timeout_secs == 0 {
            return Err(ConfigError::Invalid("IO_TIMEOUT_SECS must be > 0".into()));
        }
        if self.event_timeout_secs == 0 {
            return Err(ConfigError::Invalid("EVENT_TIMEOUT_SECS must be > 0".into()));
        }
        if self.thumbnail_width == 0 || self.thumbnail_height == 0 {
            return Err(ConfigError::Invalid(format!(
                "thumbnail dimensions must be > 0 (got {}x{})",
                self.thumbnail_width, self.thumbnail_height
            )));
        }
        if !(1..=100).contains(&self.thumbnail_quality) {
            return Err(ConfigError::Invalid(format!(
                "THUMBNAIL_QUALITY must be within 1-100 (got {})",
                self.thumbnail_quality
            )));
        }
        if self.kafka_sasl_mechanism.is_some()
            && (self.kafka_sasl_username.is_none() || self.kafka_sasl_password.is_none())
        {
            return Err(ConfigError::Invalid(
                "KAFKA_SASL_MECHANISM requires KAFKA_SASL_USERNAME and KAFKA_SASL_PASSWORD".into(),
            ));
        }
        Ok(())
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::from_secs(self.io_timeout_secs)
    }

    pub fn event_timeout(&self) -> Duration {
        Duration::from_secs(self.event_timeout_secs)
    }

    pub fn batch_max_wait(&self) -> Duration {
        Duration::from_millis(self.batch_max_wait_ms)
    }

    /// Retry policy for idempotent events (ProductAdded)
    pub fn event_retry(&self) -> resilience::RetryConfig {
        resilience::RetryConfig {
            max_retries: self.event_max_retries,
            initial_backoff: Duration::from_millis(self.retry_initial_backoff_ms),
            max_backoff: Duration::from_millis(self.retry_max_backoff_ms),
            ..resilience::presets::image_fetch_config()
        }
    }

    /// Retry policy for version conflicts during quantity adjustment
    pub fn conflict_retry(&self) -> resilience::RetryConfig {
        resilience::RetryConfig {
            max_retries: self.quantity_max_conflict_retries,
            ..resilience::presets::record_store_config()
        }
    }

    /// Reconnect schedule after transport errors
    pub fn reconnect(&self) -> resilience::RetryConfig {
        resilience::RetryConfig {
            max_retries: self.reconnect_max_attempts,
            max_backoff: Duration::from_secs(self.reconnect_max_backoff_secs),
            ..resilience::presets::event_source_reconnect_config()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(extra: &[(&str, &str)]) -> Vec<(String, String)> {
        let mut vars = vec![
            ("DATABASE_URL".to_string(), "postgres://localhost/inventory".to_string()),
            ("BLOB_BUCKET".to_string(), "thumbnails".to_string()),
        ];
        vars.extend(extra.iter().map(|(k, v)| (k.to_string(), v.to_string())));
        vars
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_vars(vars(&[])).unwrap();
        assert_eq!(config.kafka_brokers, "localhost:9092");
        assert_eq!(config.kafka_topic, "inventory-events");
        assert_eq!(config.kafka_group_id, "$Default");
        assert_eq!(config.thumbnail_width, 100);
        assert_eq!(config.thumbnail_height, 100);
        assert_eq!(config.batch_max_size, 100);
        assert_eq!(config.event_timeout(), Duration::from_secs(60));
        assert_eq!(config.conflict_retry().max_retries, 5);
        assert_eq!(config.http_port, 8090);
    }

    #[test]
    fn test_missing_required_fails() {
        let result = Config::from_vars(vec![(
            "DATABASE_URL".to_string(),
            "postgres://localhost/inventory".to_string(),
        )]);
        assert!(matches!(result, Err(ConfigError::Env(_))));
    }

    #[test]
    fn test_rejects_zero_batch() {
        let result = Config::from_vars(vars(&[("BATCH_MAX_SIZE", "0")]));
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_rejects_zero_timeouts() {
        for name in ["IO_TIMEOUT_SECS", "EVENT_TIMEOUT_SECS"] {
            match Config::from_vars(vars(&[(name, "0")])) {
                Err(ConfigError::Invalid(message)) => assert!(message.contains(name)),
                other => panic!("{name}=0 accepted: {other:?}"),
            }
        }
    }

    #[test]
    fn test_rejects_bad_quality() {
        let result = Config::from_vars(vars(&[("THUMBNAIL_QUALITY", "0")]));
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_rejects_incomplete_sasl() {
        let result = Config::from_vars(vars(&[
            ("KAFKA_SASL_MECHANISM", "PLAIN"),
            ("KAFKA_SASL_USERNAME", "$ConnectionString"),
        ]));
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_vars(vars(&[
            ("EVENT_MAX_RETRIES", "1"),
            ("RECONNECT_MAX_ATTEMPTS", "2"),
            ("BLOB_ENDPOINT", "http://minio:9000"),
        ]))
        .unwrap();
        assert_eq!(config.event_retry().max_retries, 1);
        assert_eq!(config.reconnect().max_retries, 2);
        assert_eq!(config.blob_endpoint.as_deref(), Some("http://minio:9000"));
    }
}
