//! Inventory events
//!
//! The closed set of commands the pipeline understands. Raw payloads are
//! turned into these exclusively by [`decoder::decode`]; nothing downstream
//! looks at the JSON shape again.

pub mod decoder;

pub use decoder::{decode, DecodedEvent, ItemRejection};

use crate::models::RecordKey;
use serde_json::{json, Value};

/// Wire discriminants
pub const SELLER_ADDED_PRODUCT: &str = "seller_added_product";
pub const VIEW_CART: &str = "view_cart";
pub const LEAVE_CART: &str = "leave_cart";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InventoryEvent {
    /// A seller listed a product with a source image
    ProductAdded(ProductAdded),
    /// A shopper reserved stock by entering the cart view
    CartEntered(CartItems),
    /// A shopper released reserved stock by leaving the cart
    CartLeft(CartItems),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductAdded {
    pub seller_id: String,
    pub product_id: String,
    pub image_url: String,
}

impl ProductAdded {
    pub fn key(&self) -> RecordKey {
        RecordKey::new(&self.seller_id, &self.product_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CartItems {
    pub items: Vec<CartItem>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartItem {
    pub seller_id: String,
    pub product_id: String,
    pub user_quantity: u64,
}

impl CartItem {
    pub fn key(&self) -> RecordKey {
        RecordKey::new(&self.seller_id, &self.product_id)
    }
}

impl InventoryEvent {
    /// Wire discriminant of this event
    pub fn name(&self) -> &'static str {
        match self {
            InventoryEvent::ProductAdded(_) => SELLER_ADDED_PRODUCT,
            InventoryEvent::CartEntered(_) => VIEW_CART,
            InventoryEvent::CartLeft(_) => LEAVE_CART,
        }
    }

    /// Whether handling this event twice has the same effect as handling it once.
    ///
    /// ProductAdded writes to a deterministic blob key and sets `thumbnailUrl`
    /// unconditionally; cart events move stock and are not.
    pub fn is_idempotent(&self) -> bool {
        matches!(self, InventoryEvent::ProductAdded(_))
    }

    /// Partition key used when publishing (the seller of the first affected record)
    pub fn seller_id(&self) -> Option<&str> {
        match self {
            InventoryEvent::ProductAdded(e) => Some(&e.seller_id),
            InventoryEvent::CartEntered(c) | InventoryEvent::CartLeft(c) => {
                c.items.first().map(|item| item.seller_id.as_str())
            }
        }
    }

    /// JSON shape accepted by the decoder
    pub fn to_wire(&self) -> Value {
        match self {
            InventoryEvent::ProductAdded(e) => json!({
                "eventName": SELLER_ADDED_PRODUCT,
                "sellerId": e.seller_id,
                "productId": e.product_id,
                "imageUrl": e.image_url,
            }),
            InventoryEvent::CartEntered(c) | InventoryEvent::CartLeft(c) => json!({
                "eventName": self.name(),
                "cartItems": c
                    .items
                    .iter()
                    .map(|item| json!({
                        "partitionKey": item.seller_id,
                        "rowKey": item.product_id,
                        "userQuantity": item.user_quantity,
                    }))
                    .collect::<Vec<_>>(),
            }),
        }
    }
}
