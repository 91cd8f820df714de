/// Resilience patterns for the inventory pipeline
///
/// This library provides the failure-handling primitives shared by the
/// event consumer and its collaborators:
/// - **Retry**: Exponential backoff with jitter, optionally gated by an error classifier
/// - **Backoff**: A reusable backoff schedule for reconnect loops
/// - **Timeout**: Enforces time limits on all external calls
/// - **Preset Configurations**: Pre-tuned retry schedules for image fetches,
///   the record store and the event source
///
/// # Example: Retry only transient failures
///
/// ```rust,no_run
/// use resilience::{presets, with_retry_if};
///
/// #[derive(Debug)]
/// enum FetchError { Transient, NotFound }
///
/// impl std::fmt::Display for FetchError {
///     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
///         write!(f, "{:?}", self)
///     }
/// }
///
/// #[tokio::main]
/// async fn main() {
///     let config = presets::image_fetch_config();
///
///     let result = with_retry_if(
///         config,
///         |e: &FetchError| matches!(e, FetchError::Transient),
///         || async { Err::<(), _>(FetchError::NotFound) },
///     )
///     .await;
///
///     assert!(result.is_err());
/// }
/// ```
///
/// # Example: Store read with a deadline
///
/// ```rust,no_run
/// use resilience::with_timeout;
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() {
///     match with_timeout(Duration::from_secs(10), async { Ok::<_, String>(42) }).await {
///         Ok(Ok(quantity)) => println!("read {quantity}"),
///         Ok(Err(e)) => println!("store failed: {e}"),
///         Err(elapsed) => println!("{elapsed}"),
///     }
/// }
/// ```

pub mod backoff;
pub mod presets;
pub mod retry;
pub mod timeout;

// Re-export main types for convenience
pub use backoff::Backoff;
pub use presets::{event_source_reconnect_config, image_fetch_config, record_store_config};
pub use retry::{with_retry, with_retry_if, RetryConfig, RetryError};
pub use timeout::{with_timeout, TimeoutError};
