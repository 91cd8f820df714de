//! Event handler - applies the business effect of one decoded event
//!
//! - ProductAdded: generate the thumbnail, then merge `thumbnailUrl` into the record
//! - CartEntered: reserve stock (`-userQuantity`) per item
//! - CartLeft: release stock (`+userQuantity`) per item
//!
//! Cart items are independent; one failing item never affects its siblings.

use super::inventory::{Adjustment, QuantityAdjuster};
use super::thumbnail::ThumbnailService;
use crate::error::{ProcessingError, Result};
use crate::events::{CartItem, CartItems, InventoryEvent, ProductAdded};
use crate::models::{Precondition, ProductPatch, RecordKey};
use crate::store::RecordStore;
use resilience::{with_retry_if, with_timeout, RetryConfig, RetryError};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Timeouts and retry policy applied around each event
#[derive(Debug, Clone)]
pub struct HandlerConfig {
    pub io_timeout: Duration,
    pub event_timeout: Duration,
    /// Only used for idempotent events
    pub event_retry: RetryConfig,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            io_timeout: Duration::from_secs(10),
            event_timeout: Duration::from_secs(60),
            event_retry: resilience::presets::image_fetch_config(),
        }
    }
}

/// What an event changed
#[derive(Debug)]
pub enum HandleReport {
    ThumbnailSet {
        key: RecordKey,
        url: String,
    },
    Cart {
        applied: Vec<Adjustment>,
        failed: Vec<(RecordKey, ProcessingError)>,
    },
}

impl HandleReport {
    /// Label for the events counter. `rejected_items` counts cart items the
    /// decoder already refused, which never reach the handler.
    pub fn outcome(&self, rejected_items: usize) -> &'static str {
        match self {
            HandleReport::ThumbnailSet { .. } => "applied",
            HandleReport::Cart { applied, failed } => {
                match (applied.is_empty(), failed.len() + rejected_items) {
                    (true, 0) => "noop",
                    (false, 0) => "applied",
                    (true, _) => "rejected",
                    (false, _) => "partial",
                }
            }
        }
    }
}

pub struct EventHandler {
    store: Arc<dyn RecordStore>,
    thumbnails: ThumbnailService,
    adjuster: QuantityAdjuster,
    config: HandlerConfig,
}

impl EventHandler {
    pub fn new(
        store: Arc<dyn RecordStore>,
        thumbnails: ThumbnailService,
        adjuster: QuantityAdjuster,
        config: HandlerConfig,
    ) -> Self {
        Self {
            store,
            thumbnails,
            adjuster,
            config,
        }
    }

    /// Handle one event under the event timeout, retrying transient failures
    /// when the event is idempotent
    pub async fn process(&self, event: &InventoryEvent) -> Result<HandleReport> {
        let retry = if event.is_idempotent() {
            self.config.event_retry.clone()
        } else {
            RetryConfig::none()
        };

        with_retry_if(retry, ProcessingError::is_retryable, || async {
            with_timeout(self.config.event_timeout, self.handle(event)).await?
        })
        .await
        .map_err(RetryError::into_inner)
    }

    /// Handle one event once
    pub async fn handle(&self, event: &InventoryEvent) -> Result<HandleReport> {
        match event {
            InventoryEvent::ProductAdded(added) => self.handle_product_added(added).await,
            InventoryEvent::CartEntered(cart) => Ok(self.handle_cart(cart, Direction::Reserve).await),
            InventoryEvent::CartLeft(cart) => Ok(self.handle_cart(cart, Direction::Release).await),
        }
    }

    async fn handle_product_added(&self, added: &ProductAdded) -> Result<HandleReport> {
        let key = added.key();
        let url = self.thumbnails.generate(&key, &added.image_url).await?;

        // Fixed URL per product, so an unconditional merge is safe to repeat
        with_timeout(
            self.config.io_timeout,
            self.store.merge_update(
                &key,
                &ProductPatch::new().thumbnail_url(url.clone()),
                Precondition::Any,
            ),
        )
        .await??;

        info!(
            seller_id = %key.seller_id(),
            product_id = %key.product_id(),
            thumbnail_url = %url,
            "Thumbnail URL recorded"
        );
        Ok(HandleReport::ThumbnailSet { key, url })
    }

    async fn handle_cart(&self, cart: &CartItems, direction: Direction) -> HandleReport {
        let mut applied = Vec::with_capacity(cart.items.len());
        let mut failed = Vec::new();

        for item in &cart.items {
            let key = item.key();
            match self.adjust_item(item, direction).await {
                Ok(adjustment) => {
                    info!(
                        seller_id = %key.seller_id(),
                        product_id = %key.product_id(),
                        quantity = adjustment.updated,
                        "Updated quantity"
                    );
                    applied.push(adjustment);
                }
                Err(e) => {
                    log_item_failure(&key, &e);
                    failed.push((key, e));
                }
            }
        }

        HandleReport::Cart { applied, failed }
    }

    async fn adjust_item(&self, item: &CartItem, direction: Direction) -> Result<Adjustment> {
        let amount = i64::try_from(item.user_quantity).map_err(|_| {
            ProcessingError::MalformedEvent(format!("userQuantity {} out of range", item.user_quantity))
        })?;
        let delta = match direction {
            Direction::Reserve => -amount,
            Direction::Release => amount,
        };
        self.adjuster.adjust(&item.key(), delta).await
    }
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    Reserve,
    Release,
}

fn log_item_failure(key: &RecordKey, err: &ProcessingError) {
    if err.is_policy_rejection() {
        warn!(
            seller_id = %key.seller_id(),
            product_id = %key.product_id(),
            kind = err.kind(),
            error = %err,
            "Skipping quantity update"
        );
    } else {
        error!(
            seller_id = %key.seller_id(),
            product_id = %key.product_id(),
            kind = err.kind(),
            error = %err,
            "Failed to update quantity"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::{thumbnail_key, InMemoryBlobStore};
    use crate::models::{fields, ProductRecord, StockLevel};
    use crate::services::thumbnail::{ScriptedImageFetcher, ThumbnailProcessor};
    use crate::store::InMemoryRecordStore;
    use image::{DynamicImage, ImageOutputFormat, RgbImage};
    use std::io::Cursor;

    struct Fixture {
        store: Arc<InMemoryRecordStore>,
        blobs: Arc<InMemoryBlobStore>,
        fetcher: Arc<ScriptedImageFetcher>,
        handler: EventHandler,
    }

    fn jpeg() -> Vec<u8> {
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::new(320, 240))
            .write_to(&mut Cursor::new(&mut buf), ImageOutputFormat::Jpeg(90))
            .unwrap();
        buf
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryRecordStore::new());
        let blobs = Arc::new(InMemoryBlobStore::default());
        let fetcher = Arc::new(ScriptedImageFetcher::new());
        let quick = RetryConfig {
            max_retries: 2,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(5),
            jitter: false,
            ..Default::default()
        };
        let config = HandlerConfig {
            io_timeout: Duration::from_secs(2),
            event_timeout: Duration::from_secs(5),
            event_retry: quick.clone(),
        };
        let thumbnails = ThumbnailService::new(
            fetcher.clone(),
            Arc::new(ThumbnailProcessor::with_defaults()),
            blobs.clone(),
            config.io_timeout,
        );
        let adjuster = QuantityAdjuster::new(store.clone(), config.io_timeout, quick);
        let handler = EventHandler::new(store.clone(), thumbnails, adjuster, config);
        Fixture {
            store,
            blobs,
            fetcher,
            handler,
        }
    }

    fn product_added(product_id: &str, url: &str) -> InventoryEvent {
        InventoryEvent::ProductAdded(ProductAdded {
            seller_id: "s1".into(),
            product_id: product_id.into(),
            image_url: url.into(),
        })
    }

    fn cart(items: &[(&str, u64)]) -> CartItems {
        CartItems {
            items: items
                .iter()
                .map(|(product_id, quantity)| CartItem {
                    seller_id: "s1".into(),
                    product_id: product_id.to_string(),
                    user_quantity: *quantity,
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_product_added_sets_thumbnail_url() {
        let f = fixture();
        let key = RecordKey::new("s1", "p2");
        f.store.seed(ProductRecord::new(key.clone()));
        f.fetcher.respond("http://x/img.jpg", jpeg());

        let report = f.handler.process(&product_added("p2", "http://x/img.jpg")).await.unwrap();

        let expected_url = f.blobs.url_for(&thumbnail_key(&key));
        assert!(matches!(report, HandleReport::ThumbnailSet { ref url, .. } if *url == expected_url));
        assert_eq!(f.store.snapshot(&key).unwrap().thumbnail_url(), Some(expected_url.as_str()));
        assert_eq!(f.blobs.get(&thumbnail_key(&key)).unwrap().content_type, "image/jpeg");
    }

    #[tokio::test]
    async fn test_product_added_fetch_404_leaves_no_trace() {
        let f = fixture();
        let key = RecordKey::new("s1", "p2");
        f.store.seed(ProductRecord::new(key.clone()));
        f.fetcher.respond_status("http://x/img.jpg", 404);

        let err = f.handler.process(&product_added("p2", "http://x/img.jpg")).await.unwrap_err();

        assert!(matches!(err, ProcessingError::Fetch { .. }));
        assert!(f.blobs.is_empty());
        assert_eq!(f.store.write_count(), 0);
        assert_eq!(f.store.snapshot(&key).unwrap().thumbnail_url(), None);
    }

    #[tokio::test]
    async fn test_product_added_retries_transient_fetch() {
        let f = fixture();
        f.store.seed(ProductRecord::new(RecordKey::new("s1", "p2")));
        f.fetcher.respond("http://x/img.jpg", jpeg()).fail_next("http://x/img.jpg", 2);

        f.handler.process(&product_added("p2", "http://x/img.jpg")).await.unwrap();
        assert_eq!(f.fetcher.calls("http://x/img.jpg"), 3);
    }

    #[tokio::test]
    async fn test_product_added_retries_upload_failure() {
        let f = fixture();
        f.store.seed(ProductRecord::new(RecordKey::new("s1", "p2")));
        f.fetcher.respond("http://x/img.jpg", jpeg());
        f.blobs.fail_next(1);

        f.handler.process(&product_added("p2", "http://x/img.jpg")).await.unwrap();
        assert_eq!(f.blobs.put_count(), 1);
    }

    #[tokio::test]
    async fn test_product_added_before_record_exists() {
        let f = fixture();
        f.fetcher.respond("http://x/img.jpg", jpeg());

        let err = f.handler.process(&product_added("p9", "http://x/img.jpg")).await.unwrap_err();

        assert!(matches!(err, ProcessingError::RecordNotFound(_)));
        // Not retried
        assert_eq!(f.fetcher.calls("http://x/img.jpg"), 1);
    }

    #[tokio::test]
    async fn test_cart_items_are_isolated() {
        let f = fixture();
        f.store.seed(ProductRecord::new(RecordKey::new("s1", "p1")).with_field(fields::QUANTITY, 3));
        f.store.seed(ProductRecord::new(RecordKey::new("s1", "p2")).with_field(fields::QUANTITY, 1));

        let report = f
            .handler
            .process(&InventoryEvent::CartEntered(cart(&[("p1", 2), ("p2", 5), ("ghost", 1)])))
            .await
            .unwrap();

        let HandleReport::Cart { applied, failed } = &report else {
            panic!("expected cart report");
        };
        assert_eq!(applied.len(), 1);
        assert_eq!(failed.len(), 2);
        assert_eq!(report.outcome(0), "partial");
        assert_eq!(
            f.store.snapshot(&RecordKey::new("s1", "p1")).unwrap().stock(),
            StockLevel::Known(1)
        );
        assert_eq!(
            f.store.snapshot(&RecordKey::new("s1", "p2")).unwrap().stock(),
            StockLevel::Known(1)
        );
    }

    #[tokio::test]
    async fn test_cart_left_restores_stock() {
        let f = fixture();
        f.store.seed(ProductRecord::new(RecordKey::new("s1", "p3")));

        f.handler
            .process(&InventoryEvent::CartLeft(cart(&[("p3", 4)])))
            .await
            .unwrap();

        assert_eq!(
            f.store.snapshot(&RecordKey::new("s1", "p3")).unwrap().stock(),
            StockLevel::Known(4)
        );
    }

    #[tokio::test]
    async fn test_cart_outcome_counts_decoder_rejections() {
        let f = fixture();
        f.store.seed(ProductRecord::new(RecordKey::new("s1", "p1")).with_field(fields::QUANTITY, 3));

        let emptied = f
            .handler
            .process(&InventoryEvent::CartEntered(cart(&[])))
            .await
            .unwrap();
        assert_eq!(emptied.outcome(1), "rejected");
        assert_eq!(emptied.outcome(0), "noop");

        let report = f
            .handler
            .process(&InventoryEvent::CartEntered(cart(&[("p1", 1)])))
            .await
            .unwrap();
        assert_eq!(report.outcome(0), "applied");
        assert_eq!(report.outcome(2), "partial");
        assert_eq!(f.store.write_count(), 1);
    }
}
