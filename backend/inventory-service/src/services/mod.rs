//! Business logic layer for inventory-service

pub mod catalog;
pub mod handler;
pub mod inventory;
pub mod thumbnail;

pub use catalog::CatalogService;
pub use handler::{EventHandler, HandleReport, HandlerConfig};
pub use inventory::{Adjustment, QuantityAdjuster};
pub use thumbnail::{
    HttpImageFetcher, ImageFetcher, ScriptedImageFetcher, ThumbnailConfig, ThumbnailProcessor,
    ThumbnailService,
};
