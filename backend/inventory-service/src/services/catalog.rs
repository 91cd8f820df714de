//! Product catalog - the seller-facing creation flow that feeds the pipeline
//!
//! Creating a product stores the record (with its source image URLs) and
//! then announces it with a `seller_added_product` event, which is what
//! eventually gives the record its thumbnail.

use crate::error::CatalogError;
use crate::events::{InventoryEvent, ProductAdded};
use crate::kafka::EventPublisher;
use crate::models::{fields, Precondition, ProductDraft, ProductPatch, ProductRecord, RecordKey, Version};
use crate::store::RecordStore;
use futures::stream::{BoxStream, StreamExt};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

pub struct CatalogService {
    store: Arc<dyn RecordStore>,
    publisher: Arc<dyn EventPublisher>,
}

impl CatalogService {
    pub fn new(store: Arc<dyn RecordStore>, publisher: Arc<dyn EventPublisher>) -> Self {
        Self { store, publisher }
    }

    /// Create a product under a fresh id and announce it
    pub async fn create_product(
        &self,
        seller_id: &str,
        draft: ProductDraft,
        image_urls: &[String],
    ) -> Result<ProductRecord, CatalogError> {
        if seller_id.trim().is_empty() {
            return Err(CatalogError::Invalid("seller id is required".into()));
        }

        let key = RecordKey::new(seller_id, Uuid::new_v4().to_string());
        let image_urls: Vec<&str> = image_urls
            .iter()
            .map(|url| url.trim())
            .filter(|url| !url.is_empty())
            .collect();

        let mut record = ProductRecord {
            key: key.clone(),
            properties: draft.into_properties(),
        };
        if !image_urls.is_empty() {
            record = record.with_field(fields::IMAGE_URLS, image_urls.join(","));
        }

        self.store.create(record.clone()).await?;
        info!(
            seller_id = %key.seller_id(),
            product_id = %key.product_id(),
            images = image_urls.len(),
            "Product created"
        );

        if let Some(first) = image_urls.first() {
            let event = InventoryEvent::ProductAdded(ProductAdded {
                seller_id: key.seller_id().to_string(),
                product_id: key.product_id().to_string(),
                image_url: first.to_string(),
            });
            self.publisher
                .publish(&event)
                .await
                .map_err(|source| CatalogError::Publish {
                    key: key.clone(),
                    source,
                })?;
        }

        Ok(record)
    }

    /// Stream every product of a seller
    pub fn list_seller_products<'a>(
        &'a self,
        seller_id: &str,
    ) -> BoxStream<'a, Result<ProductRecord, CatalogError>> {
        self.store
            .list_by_partition(seller_id)
            .map(|result| result.map_err(CatalogError::from))
            .boxed()
    }

    /// Merge-update seller-editable attributes. `thumbnailUrl` is derived and cannot be set here.
    pub async fn update_product(
        &self,
        key: &RecordKey,
        patch: ProductPatch,
    ) -> Result<Version, CatalogError> {
        if patch.is_empty() {
            return Err(CatalogError::Invalid("nothing to update".into()));
        }
        if patch.fields().contains_key(fields::THUMBNAIL_URL) {
            return Err(CatalogError::Invalid(format!(
                "{} is managed by the thumbnail pipeline",
                fields::THUMBNAIL_URL
            )));
        }
        if let Some(quantity) = patch.fields().get(fields::QUANTITY) {
            if !matches!(quantity, Value::Number(n) if n.is_u64()) {
                return Err(CatalogError::Invalid(format!(
                    "quantity must be a non-negative integer, got {quantity}"
                )));
            }
        }

        let version = self
            .store
            .merge_update(key, &patch, Precondition::Any)
            .await?;

        info!(key = %key, %version, "Product updated");
        Ok(version)
    }
}
