/// Data models for inventory-service
///
/// This module defines structures for:
/// - RecordKey: (sellerId, productId) identity of a product record
/// - ProductRecord: the stored product entity and its typed accessors
/// - ProductPatch: a merge-update of selected fields
/// - Version / Versioned: optimistic concurrency token returned by the store
///
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Field names used in the stored entity (camelCase, as written by the catalog UI)
pub mod fields {
    pub const DESCRIPTION: &str = "description";
    pub const PRICE: &str = "price";
    pub const SIZE: &str = "size";
    pub const COLOR: &str = "color";
    pub const MATERIAL: &str = "material";
    pub const SHIPPING: &str = "shipping";
    pub const QUANTITY: &str = "quantity";
    pub const IMAGE_URLS: &str = "imageUrls";
    pub const THUMBNAIL_URL: &str = "thumbnailUrl";
}

// ========================================
// Identity
// ========================================

/// Composite identity of a product record: partition key = seller, row key = product
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordKey {
    pub partition_key: String,
    pub row_key: String,
}

impl RecordKey {
    pub fn new(seller_id: impl Into<String>, product_id: impl Into<String>) -> Self {
        Self {
            partition_key: seller_id.into(),
            row_key: product_id.into(),
        }
    }

    pub fn seller_id(&self) -> &str {
        &self.partition_key
    }

    pub fn product_id(&self) -> &str {
        &self.row_key
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.partition_key, self.row_key)
    }
}

/// Per-record write counter. Incremented by the store on every successful write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Version(pub u64);

impl Version {
    pub const INITIAL: Version = Version(1);

    pub fn next(self) -> Self {
        Version(self.0 + 1)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// A value read from the store together with the version it was read at
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    pub value: T,
    pub version: Version,
}

/// Write precondition for merge-updates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
    /// Unconditional merge (used for idempotent writes such as `thumbnailUrl`)
    Any,
    /// Only apply if the stored version still equals this one
    Version(Version),
}

// ========================================
// Stock
// ========================================

/// Interpretation of the stored `quantity` field
#[derive(Debug, Clone, PartialEq)]
pub enum StockLevel {
    Known(u64),
    Missing,
    /// Present but not a non-negative integer (legacy writers stored free text)
    Unparsable(Value),
}

impl StockLevel {
    pub fn from_value(value: Option<&Value>) -> Self {
        match value {
            None | Some(Value::Null) => StockLevel::Missing,
            Some(Value::Number(n)) => match n.as_u64() {
                Some(q) => StockLevel::Known(q),
                None => StockLevel::Unparsable(Value::Number(n.clone())),
            },
            Some(Value::String(s)) => match s.trim().parse::<u64>() {
                Ok(q) => StockLevel::Known(q),
                Err(_) => StockLevel::Unparsable(Value::String(s.clone())),
            },
            Some(other) => StockLevel::Unparsable(other.clone()),
        }
    }
}

// ========================================
// Product Record
// ========================================

/// Stored product entity.
///
/// Properties are kept as an open JSON map so fields written by other
/// collaborators survive a merge-update untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub key: RecordKey,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl ProductRecord {
    pub fn new(key: RecordKey) -> Self {
        Self {
            key,
            properties: Map::new(),
        }
    }

    pub fn with_field(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.properties.insert(field.to_string(), value.into());
        self
    }

    pub fn field(&self, field: &str) -> Option<&Value> {
        self.properties.get(field)
    }

    fn str_field(&self, field: &str) -> Option<&str> {
        self.properties
            .get(field)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    pub fn stock(&self) -> StockLevel {
        StockLevel::from_value(self.properties.get(fields::QUANTITY))
    }

    pub fn thumbnail_url(&self) -> Option<&str> {
        self.str_field(fields::THUMBNAIL_URL)
    }

    pub fn description(&self) -> Option<&str> {
        self.str_field(fields::DESCRIPTION)
    }

    /// Source image URLs in upload order (stored comma-joined)
    pub fn image_urls(&self) -> Vec<&str> {
        self.str_field(fields::IMAGE_URLS)
            .map(|joined| {
                joined
                    .split(',')
                    .map(str::trim)
                    .filter(|url| !url.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Merge the patch into this record, overwriting only the patched fields
    pub fn apply(&mut self, patch: &ProductPatch) {
        for (field, value) in &patch.fields {
            self.properties.insert(field.clone(), value.clone());
        }
    }
}

/// Partial update: only the fields present are overwritten
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductPatch {
    fields: Map<String, Value>,
}

impl ProductPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn quantity(self, quantity: u64) -> Self {
        self.set(fields::QUANTITY, quantity)
    }

    pub fn thumbnail_url(self, url: impl Into<String>) -> Self {
        self.set(fields::THUMBNAIL_URL, url.into())
    }

    pub fn set(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(field.to_string(), value.into());
        self
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Attributes supplied by a seller when listing a new product
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDraft {
    pub description: Option<String>,
    pub price: Option<String>,
    pub size: Option<String>,
    pub color: Option<String>,
    pub material: Option<String>,
    pub shipping: Option<String>,
    pub quantity: Option<u64>,
}

impl ProductDraft {
    /// Stored properties, with empty text fields dropped
    pub fn into_properties(self) -> Map<String, Value> {
        let mut properties = Map::new();
        let text_fields = [
            (fields::DESCRIPTION, self.description),
            (fields::PRICE, self.price),
            (fields::SIZE, self.size),
            (fields::COLOR, self.color),
            (fields::MATERIAL, self.material),
            (fields::SHIPPING, self.shipping),
        ];
        for (field, value) in text_fields {
            if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
                properties.insert(field.to_string(), Value::String(value));
            }
        }
        if let Some(quantity) = self.quantity {
            properties.insert(fields::QUANTITY.to_string(), Value::from(quantity));
        }
        properties
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_stock_level_interpretation() {
        assert_eq!(StockLevel::from_value(None), StockLevel::Missing);
        assert_eq!(StockLevel::from_value(Some(&json!(null))), StockLevel::Missing);
        assert_eq!(StockLevel::from_value(Some(&json!(7))), StockLevel::Known(7));
        assert_eq!(StockLevel::from_value(Some(&json!(" 12 "))), StockLevel::Known(12));
        assert!(matches!(
            StockLevel::from_value(Some(&json!(-1))),
            StockLevel::Unparsable(_)
        ));
        assert!(matches!(
            StockLevel::from_value(Some(&json!("lots"))),
            StockLevel::Unparsable(_)
        ));
        assert!(matches!(
            StockLevel::from_value(Some(&json!(2.5))),
            StockLevel::Unparsable(_)
        ));
    }

    #[test]
    fn test_image_urls_split() {
        let record = ProductRecord::new(RecordKey::new("s1", "p1"))
            .with_field(fields::IMAGE_URLS, "http://a/1.jpg, http://a/2.jpg,,");
        assert_eq!(record.image_urls(), vec!["http://a/1.jpg", "http://a/2.jpg"]);
    }

    #[test]
    fn test_apply_patch_keeps_other_fields() {
        let mut record = ProductRecord::new(RecordKey::new("s1", "p1"))
            .with_field(fields::COLOR, "red")
            .with_field(fields::QUANTITY, 3);

        record.apply(&ProductPatch::new().quantity(1).thumbnail_url("http://t/1.jpg"));

        assert_eq!(record.stock(), StockLevel::Known(1));
        assert_eq!(record.thumbnail_url(), Some("http://t/1.jpg"));
        assert_eq!(record.field(fields::COLOR), Some(&json!("red")));
    }

    #[test]
    fn test_draft_drops_empty_fields() {
        let draft = ProductDraft {
            description: Some("Linen shirt".to_string()),
            price: Some("".to_string()),
            color: Some("  ".to_string()),
            quantity: Some(4),
            ..Default::default()
        };

        let properties = draft.into_properties();
        assert_eq!(properties.len(), 2);
        assert_eq!(properties.get(fields::DESCRIPTION), Some(&json!("Linen shirt")));
        assert_eq!(properties.get(fields::QUANTITY), Some(&json!(4)));
    }
}
