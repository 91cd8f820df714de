//! Event decoder: raw payload bytes -> [`InventoryEvent`]
//!
//! Producers have used two spellings for the discriminant (`eventName`, and
//! the older `action`). Cart items that fail validation are rejected one by
//! one; their siblings still decode.

use super::{CartItem, CartItems, InventoryEvent, ProductAdded, LEAVE_CART, SELLER_ADDED_PRODUCT, VIEW_CART};
use crate::error::{ProcessingError, Result};
use serde_json::{Map, Value};

/// A decoded event plus the cart items that were dropped during decoding
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedEvent {
    pub event: InventoryEvent,
    pub rejected_items: Vec<ItemRejection>,
}

/// A cart item skipped by the decoder
#[derive(Debug, Clone, PartialEq)]
pub struct ItemRejection {
    /// Position in the event's item list
    pub index: usize,
    pub reason: String,
}

pub fn decode(payload: &[u8]) -> Result<DecodedEvent> {
    if payload.is_empty() {
        return Err(ProcessingError::MalformedEvent("empty payload".into()));
    }

    let value: Value = serde_json::from_slice(payload)
        .map_err(|e| ProcessingError::MalformedEvent(format!("invalid JSON: {e}")))?;

    let Value::Object(object) = value else {
        return Err(ProcessingError::MalformedEvent(
            "payload is not a JSON object".into(),
        ));
    };

    decode_object(&object)
}

pub fn decode_object(object: &Map<String, Value>) -> Result<DecodedEvent> {
    let name = discriminant(object).ok_or_else(|| {
        ProcessingError::MalformedEvent("missing eventName or action".into())
    })?;

    match name {
        SELLER_ADDED_PRODUCT => decode_product_added(object).map(|event| DecodedEvent {
            event,
            rejected_items: Vec::new(),
        }),
        VIEW_CART => {
            let (items, rejected_items) = decode_cart_items(object)?;
            Ok(DecodedEvent {
                event: InventoryEvent::CartEntered(items),
                rejected_items,
            })
        }
        LEAVE_CART => {
            let (items, rejected_items) = decode_cart_items(object)?;
            Ok(DecodedEvent {
                event: InventoryEvent::CartLeft(items),
                rejected_items,
            })
        }
        other => Err(ProcessingError::UnsupportedEvent(other.to_string())),
    }
}

/// `eventName` wins over `action`; an empty `eventName` falls back
fn discriminant(object: &Map<String, Value>) -> Option<&str> {
    non_empty_str(object, "eventName")
        .or_else(|| non_empty_str(object, "action"))
        .map(str::trim)
}

/// Blank strings count as absent; anything else is passed through verbatim
/// since keys must name exactly the record the producer meant
fn non_empty_str<'a>(object: &'a Map<String, Value>, field: &str) -> Option<&'a str> {
    object
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

fn decode_product_added(object: &Map<String, Value>) -> Result<InventoryEvent> {
    let mut missing = Vec::new();
    let mut required = |field: &'static str| {
        let value = non_empty_str(object, field).map(str::to_string);
        if value.is_none() {
            missing.push(field);
        }
        value
    };

    let product_id = required("productId");
    let image_url = required("imageUrl");
    let seller_id = required("sellerId");

    match (seller_id, product_id, image_url) {
        (Some(seller_id), Some(product_id), Some(image_url)) => {
            Ok(InventoryEvent::ProductAdded(ProductAdded {
                seller_id,
                product_id,
                image_url,
            }))
        }
        _ => Err(ProcessingError::MalformedEvent(format!(
            "{SELLER_ADDED_PRODUCT} missing {}",
            missing.join(", ")
        ))),
    }
}

fn decode_cart_items(object: &Map<String, Value>) -> Result<(CartItems, Vec<ItemRejection>)> {
    let raw_items = object
        .get("cartItems")
        .or_else(|| object.get("items"))
        .and_then(Value::as_array)
        .filter(|items| !items.is_empty())
        .ok_or_else(|| ProcessingError::MalformedEvent("missing or empty cartItems".into()))?;

    let mut items = Vec::with_capacity(raw_items.len());
    let mut rejected = Vec::new();

    for (index, raw) in raw_items.iter().enumerate() {
        match decode_cart_item(raw) {
            Ok(item) => items.push(item),
            Err(reason) => rejected.push(ItemRejection { index, reason }),
        }
    }

    Ok((CartItems { items }, rejected))
}

fn decode_cart_item(raw: &Value) -> std::result::Result<CartItem, String> {
    let Value::Object(item) = raw else {
        return Err("cart item is not an object".into());
    };

    let product_id = non_empty_str(item, "rowKey").ok_or("missing rowKey")?;
    let seller_id = non_empty_str(item, "partitionKey").ok_or("missing partitionKey")?;
    let raw_quantity = item.get("userQuantity").ok_or("missing userQuantity")?;
    let user_quantity = parse_user_quantity(raw_quantity)?;

    Ok(CartItem {
        seller_id: seller_id.to_string(),
        product_id: product_id.to_string(),
        user_quantity,
    })
}

/// Integer or base-10 integer string; negative amounts are rejected
fn parse_user_quantity(raw: &Value) -> std::result::Result<u64, String> {
    let parsed = match raw {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };

    match parsed {
        Some(q) if q >= 0 => Ok(q as u64),
        Some(q) => Err(format!("negative userQuantity {q}")),
        None => Err(format!("non-integer userQuantity {raw}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode_json(value: Value) -> Result<DecodedEvent> {
        decode(value.to_string().as_bytes())
    }

    #[test]
    fn test_decode_product_added() {
        let decoded = decode_json(json!({
            "eventName": "seller_added_product",
            "sellerId": "s1",
            "productId": "p2",
            "imageUrl": "http://x/img.jpg"
        }))
        .unwrap();

        assert_eq!(
            decoded.event,
            InventoryEvent::ProductAdded(ProductAdded {
                seller_id: "s1".into(),
                product_id: "p2".into(),
                image_url: "http://x/img.jpg".into(),
            })
        );
    }

    #[test]
    fn test_legacy_action_spelling() {
        let decoded = decode_json(json!({
            "action": "leave_cart",
            "cartItems": [{"partitionKey": "s1", "rowKey": "p1", "userQuantity": 1}]
        }))
        .unwrap();
        assert!(matches!(decoded.event, InventoryEvent::CartLeft(_)));
    }

    #[test]
    fn test_event_name_preferred_over_action() {
        let decoded = decode_json(json!({
            "eventName": "view_cart",
            "action": "leave_cart",
            "cartItems": [{"partitionKey": "s1", "rowKey": "p1", "userQuantity": 1}]
        }))
        .unwrap();
        assert!(matches!(decoded.event, InventoryEvent::CartEntered(_)));
    }

    #[test]
    fn test_empty_event_name_falls_back_to_action() {
        let decoded = decode_json(json!({
            "eventName": "",
            "action": "view_cart",
            "items": [{"partitionKey": "s1", "rowKey": "p1", "userQuantity": "2"}]
        }))
        .unwrap();
        let InventoryEvent::CartEntered(cart) = decoded.event else {
            panic!("expected CartEntered");
        };
        assert_eq!(cart.items[0].user_quantity, 2);
    }

    #[test]
    fn test_missing_discriminant_is_malformed() {
        let err = decode_json(json!({"sellerId": "s1"})).unwrap_err();
        assert!(matches!(err, ProcessingError::MalformedEvent(_)));
    }

    #[test]
    fn test_unknown_discriminant_is_unsupported() {
        let err = decode_json(json!({"eventName": "checkout"})).unwrap_err();
        assert!(matches!(err, ProcessingError::UnsupportedEvent(name) if name == "checkout"));
    }

    #[test]
    fn test_non_json_and_non_object_are_malformed() {
        assert!(matches!(
            decode(b"not json").unwrap_err(),
            ProcessingError::MalformedEvent(_)
        ));
        assert!(matches!(
            decode(b"[1,2]").unwrap_err(),
            ProcessingError::MalformedEvent(_)
        ));
        assert!(matches!(
            decode(b"").unwrap_err(),
            ProcessingError::MalformedEvent(_)
        ));
    }

    #[test]
    fn test_product_added_missing_fields() {
        let err = decode_json(json!({
            "eventName": "seller_added_product",
            "sellerId": "s1",
            "imageUrl": ""
        }))
        .unwrap_err();

        match err {
            ProcessingError::MalformedEvent(msg) => {
                assert!(msg.contains("productId"));
                assert!(msg.contains("imageUrl"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_empty_cart_is_malformed() {
        for payload in [
            json!({"eventName": "view_cart", "cartItems": []}),
            json!({"eventName": "view_cart"}),
        ] {
            assert!(matches!(
                decode_json(payload).unwrap_err(),
                ProcessingError::MalformedEvent(_)
            ));
        }
    }

    #[test]
    fn test_invalid_items_are_skipped_individually() {
        let decoded = decode_json(json!({
            "eventName": "view_cart",
            "cartItems": [
                {"partitionKey": "s1", "rowKey": "p1", "userQuantity": 2},
                {"partitionKey": "s1", "userQuantity": 1},
                {"partitionKey": "s1", "rowKey": "p2", "userQuantity": "many"},
                {"partitionKey": "s1", "rowKey": "p3", "userQuantity": 1.5},
                {"partitionKey": "s1", "rowKey": "p4", "userQuantity": -1},
                {"partitionKey": "s1", "rowKey": "p5"},
                {"partitionKey": "s1", "rowKey": "p6", "userQuantity": " 3 "}
            ]
        }))
        .unwrap();

        let InventoryEvent::CartEntered(cart) = decoded.event else {
            panic!("expected CartEntered");
        };
        let products: Vec<_> = cart.items.iter().map(|i| i.product_id.as_str()).collect();
        assert_eq!(products, vec!["p1", "p6"]);
        assert_eq!(cart.items[1].user_quantity, 3);

        let rejected: Vec<_> = decoded.rejected_items.iter().map(|r| r.index).collect();
        assert_eq!(rejected, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_zero_quantity_is_valid() {
        let decoded = decode_json(json!({
            "eventName": "leave_cart",
            "cartItems": [{"partitionKey": "s1", "rowKey": "p1", "userQuantity": 0}]
        }))
        .unwrap();
        assert!(decoded.rejected_items.is_empty());
    }

    #[test]
    fn test_keys_are_not_trimmed() {
        let decoded = decode_json(json!({
            "eventName": "view_cart",
            "cartItems": [
                {"partitionKey": " s1", "rowKey": "p1 ", "userQuantity": 1},
                {"partitionKey": "s1", "rowKey": "   ", "userQuantity": 1}
            ]
        }))
        .unwrap();

        let InventoryEvent::CartEntered(cart) = decoded.event else {
            panic!("expected CartEntered");
        };
        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.items[0].seller_id, " s1");
        assert_eq!(cart.items[0].product_id, "p1 ");
        assert_eq!(decoded.rejected_items.len(), 1);
        assert_eq!(decoded.rejected_items[0].index, 1);
    }
}
