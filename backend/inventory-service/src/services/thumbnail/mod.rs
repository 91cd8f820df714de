//! Thumbnail generation
//!
//! - Image fetcher for downloading seller source images
//! - Image processor for cropping, resizing and encoding
//! - Service coordinating fetch, derive and upload

pub mod fetcher;
pub mod processor;
pub mod service;

pub use fetcher::{HttpImageFetcher, ImageFetcher, ScriptedImageFetcher};
pub use processor::{ThumbnailConfig, ThumbnailProcessor, ThumbnailResult};
pub use service::ThumbnailService;
