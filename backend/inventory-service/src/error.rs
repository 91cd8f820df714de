/// Error types for inventory-service
///
/// `ProcessingError` is the per-event failure taxonomy. Every variant is
/// contained at the single-event granularity by the consumer loop; the
/// collaborator errors (`StoreError`, `BlobError`, `SourceError`) are the
/// adapter-level failures they wrap.
use crate::models::RecordKey;
use std::time::Duration;
use thiserror::Error;

/// Result type for event processing
pub type Result<T> = std::result::Result<T, ProcessingError>;

/// Record store failures
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("record not found: {0}")]
    NotFound(RecordKey),

    #[error("record already exists: {0}")]
    AlreadyExists(RecordKey),

    #[error("version conflict on {key}: expected {expected}")]
    VersionConflict {
        key: RecordKey,
        expected: crate::models::Version,
    },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("store operation timed out after {0:?}")]
    Timeout(Duration),
}

/// Blob store failures
#[derive(Error, Debug)]
pub enum BlobError {
    #[error("upload of {key} failed: {message}")]
    Upload { key: String, message: String },

    #[error("blob store misconfigured: {0}")]
    Config(String),
}

/// Event source (log transport) failures
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("subscribe failed: {0}")]
    Subscribe(String),

    #[error("commit failed: {0}")]
    Commit(String),
}

impl From<rdkafka::error::KafkaError> for SourceError {
    fn from(err: rdkafka::error::KafkaError) -> Self {
        SourceError::Transport(err.to_string())
    }
}

/// Event publishing failures
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("failed to serialize event: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("failed to deliver event to {topic}: {message}")]
    Delivery { topic: String, message: String },

    #[error("producer misconfigured: {0}")]
    Config(String),
}

/// Product catalog (creation / listing / update) failures
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("invalid product: {0}")]
    Invalid(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("product {key} stored but event not published: {source}")]
    Publish {
        key: RecordKey,
        #[source]
        source: PublishError,
    },
}

/// Configuration failures detected at startup
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read environment: {0}")]
    Env(#[from] envy::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Per-event processing failures
#[derive(Error, Debug)]
pub enum ProcessingError {
    #[error("malformed event: {0}")]
    MalformedEvent(String),

    #[error("unsupported event: {0}")]
    UnsupportedEvent(String),

    #[error("image fetch failed for {url}: {message}")]
    Fetch { url: String, message: String },

    #[error("thumbnail upload failed: {0}")]
    Upload(#[from] BlobError),

    #[error("thumbnail generation failed: {0}")]
    Thumbnail(String),

    #[error("record not found: {0}")]
    RecordNotFound(RecordKey),

    #[error("negative quantity rejected for {key}: {current} {delta:+} would be {updated}")]
    NegativeQuantityRejected {
        key: RecordKey,
        current: u64,
        delta: i64,
        updated: i64,
    },

    #[error("quantity overflow for {key}: {current} {delta:+} is out of range")]
    QuantityOverflow {
        key: RecordKey,
        current: u64,
        delta: i64,
    },

    #[error("cannot deduct {delta} from unknown stock on {key}")]
    UnknownStock { key: RecordKey, delta: i64 },

    #[error("gave up after {attempts} version conflicts on {key}")]
    ConcurrencyConflict { key: RecordKey, attempts: u32 },

    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for ProcessingError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(key) => ProcessingError::RecordNotFound(key),
            StoreError::Timeout(after) => ProcessingError::Timeout(after),
            other => ProcessingError::Store(other),
        }
    }
}

impl From<resilience::TimeoutError> for ProcessingError {
    fn from(err: resilience::TimeoutError) -> Self {
        ProcessingError::Timeout(err.after)
    }
}

impl ProcessingError {
    /// Whether this failure is transient and the operation may be attempted again.
    ///
    /// Only consulted for idempotent work; non-idempotent effects are never
    /// re-run regardless of classification.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProcessingError::Fetch { .. }
            | ProcessingError::Upload(_)
            | ProcessingError::Timeout(_) => true,
            ProcessingError::Store(StoreError::Database(e)) => is_transient_db_error(e),
            _ => false,
        }
    }

    /// Stable snake_case label used in logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            ProcessingError::MalformedEvent(_) => "malformed_event",
            ProcessingError::UnsupportedEvent(_) => "unsupported_event",
            ProcessingError::Fetch { .. } => "fetch_error",
            ProcessingError::Upload(_) => "upload_error",
            ProcessingError::Thumbnail(_) => "thumbnail_error",
            ProcessingError::RecordNotFound(_) => "record_not_found",
            ProcessingError::NegativeQuantityRejected { .. } => "negative_quantity_rejected",
            ProcessingError::QuantityOverflow { .. } => "quantity_overflow",
            ProcessingError::UnknownStock { .. } => "unknown_stock",
            ProcessingError::ConcurrencyConflict { .. } => "concurrency_conflict",
            ProcessingError::Timeout(_) => "timeout",
            ProcessingError::Store(_) => "store_error",
        }
    }

    /// Policy rejections are logged at warn; collaborator failures at error
    pub fn is_policy_rejection(&self) -> bool {
        matches!(
            self,
            ProcessingError::MalformedEvent(_)
                | ProcessingError::UnsupportedEvent(_)
                | ProcessingError::NegativeQuantityRejected { .. }
                | ProcessingError::QuantityOverflow { .. }
                | ProcessingError::UnknownStock { .. }
        )
    }
}

fn is_transient_db_error(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_)
    )
}
