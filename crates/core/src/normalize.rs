//! Normalization of backend item payloads into [`Product`].
//!
//! Different backend endpoints describe the same catalog item with different
//! field names (`name` on listings, `item_name` on wishlist rows, and so on).
//! Everything that displays an item goes through [`normalize_product`] so
//! consumers only ever see one shape.
//!
//! Normalization is total: any JSON value produces a fully populated
//! [`Product`], falling back to empty strings and zeros.

use serde_json::{Map, Value};

use crate::types::{Product, ProductId};

const ID_KEYS: &[&str] = &["id", "item_id", "product_id"];
const NAME_KEYS: &[&str] = &["name", "item_name", "title"];
const PRICE_KEYS: &[&str] = &["price", "item_price"];
const ORIGINAL_PRICE_KEYS: &[&str] = &["original_price", "originalPrice", "old_price"];
const RATING_KEYS: &[&str] = &["rating", "average_rating"];
const ORDERS_KEYS: &[&str] = &["orders", "orders_count", "sold"];
const DATE_ADDED_KEYS: &[&str] = &["date_added", "dateAdded", "created_at"];
const DESCRIPTION_KEYS: &[&str] = &["description", "item_description"];

/// Sub-fields checked on the first element of an `images` array.
const IMAGE_SUBFIELDS: &[&str] = &["image", "image_url"];

/// Normalize a single item payload.
///
/// Wishlist rows that wrap the catalog item (`{"item": {...}, "date_added": ...}`)
/// are unwrapped; the row's own `date_added` takes precedence over the item's.
#[must_use]
pub fn normalize_product(value: &Value) -> Product {
    let Some(obj) = value.as_object() else {
        return Product::default();
    };

    let Some(inner) = obj.get("item").and_then(Value::as_object) else {
        return normalize_object(obj);
    };

    let mut product = normalize_object(inner);
    if let Some(added) = first(obj, DATE_ADDED_KEYS).and_then(scalar_to_string) {
        product.date_added = added;
    }
    if product.id.is_empty()
        && let Some(id) = obj.get("item_id").and_then(scalar_to_string)
    {
        product.id = ProductId::new(id);
    }
    product
}

/// Normalize a list payload.
///
/// Accepts either a bare array or an object carrying the array under `field`
/// (e.g. `{"wishlist": [...]}`). Any other shape is treated as an empty list.
#[must_use]
pub fn normalize_products(payload: &Value, field: &str) -> Vec<Product> {
    let items = match payload {
        Value::Array(items) => Some(items),
        Value::Object(obj) => obj.get(field).and_then(Value::as_array),
        _ => None,
    };

    items
        .map(|items| items.iter().map(normalize_product).collect())
        .unwrap_or_default()
}

fn normalize_object(obj: &Map<String, Value>) -> Product {
    Product {
        id: ProductId::new(string_field(obj, ID_KEYS)),
        name: string_field(obj, NAME_KEYS),
        price: string_field(obj, PRICE_KEYS),
        original_price: string_field(obj, ORIGINAL_PRICE_KEYS),
        image: resolve_image(obj),
        rating: first(obj, RATING_KEYS).map_or(0.0, to_f64),
        orders: first(obj, ORDERS_KEYS).map_or(0, to_u64),
        date_added: string_field(obj, DATE_ADDED_KEYS),
        description: string_field(obj, DESCRIPTION_KEYS),
    }
}

/// First alias holding a string or number.
///
/// Aliases that are present but `null`, objects or arrays are skipped.
fn first<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| obj.get(*key))
        .find(|value| value.is_string() || value.is_number())
}

fn string_field(obj: &Map<String, Value>, keys: &[&str]) -> String {
    first(obj, keys)
        .and_then(scalar_to_string)
        .unwrap_or_default()
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(
            n.as_i64()
                .map(|i| i.to_string())
                .or_else(|| n.as_u64().map(|u| u.to_string()))
                .unwrap_or_else(|| n.to_string()),
        ),
        _ => None,
    }
}

fn to_f64(value: &Value) -> f64 {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|f| f.is_finite()).unwrap_or(0.0)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // guarded by the range check
fn to_u64(value: &Value) -> u64 {
    match value {
        Value::Number(n) => n.as_u64().unwrap_or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && *f >= 0.0)
                .map_or(0, |f| f as u64)
        }),
        Value::String(s) => s.trim().parse::<u64>().unwrap_or(0),
        _ => 0,
    }
}

/// Direct `image`, else the first entry of `images`, else empty.
fn resolve_image(obj: &Map<String, Value>) -> String {
    if let Some(url) = obj.get("image").and_then(Value::as_str)
        && !url.is_empty()
    {
        return url.to_string();
    }

    let Some(head) = obj
        .get("images")
        .and_then(Value::as_array)
        .and_then(|images| images.first())
    else {
        return String::new();
    };

    match head {
        Value::String(url) => url.clone(),
        Value::Object(entry) => IMAGE_SUBFIELDS
            .iter()
            .find_map(|key| entry.get(*key).and_then(Value::as_str))
            .unwrap_or_default()
            .to_string(),
        _ => String::new(),
    }
}
