//! Inventory Service - event-driven inventory reconciliation
//!
//! This service provides:
//! - Decoding of product and cart events from the event log
//! - Thumbnail generation for newly added products
//! - Stock adjustments for items entering and leaving carts
//! - A batch consumer loop with at-least-once commits and reconnect backoff

pub mod blob;
pub mod config;
pub mod error;
pub mod events;
pub mod http;
pub mod kafka;
pub mod metrics;
pub mod models;
pub mod services;
pub mod store;

pub use blob::{BlobStore, InMemoryBlobStore, S3BlobStore};
pub use config::Config;
pub use error::{
    BlobError, CatalogError, ConfigError, ProcessingError, PublishError, SourceError, StoreError,
};
pub use events::{decode, CartItem, CartItems, DecodedEvent, InventoryEvent, ProductAdded};
pub use kafka::{ConsumerState, EventSource, InventoryConsumer, KafkaEventSource};
pub use models::{ProductPatch, ProductRecord, RecordKey, StockLevel, Version};
pub use services::{CatalogService, EventHandler, HandlerConfig, QuantityAdjuster, ThumbnailService};
pub use store::{InMemoryRecordStore, PgRecordStore, RecordStore};
