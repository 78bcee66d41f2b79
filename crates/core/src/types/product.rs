//! Canonical product record shared by every consumer of catalog data.

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use super::ProductId;

/// A normalized catalog item.
///
/// Every field has a defined value even when the source payload omits it:
/// strings default to empty, numbers to zero. Prices are kept as the string
/// the backend sent so no precision is lost; use [`Product::price_decimal`]
/// for arithmetic.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: String,
    pub original_price: String,
    /// Image URL, empty when the item has no image.
    pub image: String,
    pub rating: f64,
    /// Number of completed orders.
    pub orders: u64,
    /// ISO-8601 timestamp the item was added (to the catalog or wishlist).
    pub date_added: String,
    pub description: String,
}

impl Product {
    /// Minimal stand-in used for an optimistic wishlist insert when the
    /// caller has no product data at hand.
    #[must_use]
    pub fn placeholder(id: ProductId, now: DateTime<Utc>) -> Self {
        Self {
            id,
            date_added: now.to_rfc3339_opts(SecondsFormat::Millis, true),
            ..Self::default()
        }
    }

    /// Parse the price as a decimal.
    #[must_use]
    pub fn price_decimal(&self) -> Option<Decimal> {
        parse_decimal(&self.price)
    }

    /// Parse the original (pre-discount) price as a decimal.
    #[must_use]
    pub fn original_price_decimal(&self) -> Option<Decimal> {
        parse_decimal(&self.original_price)
    }

    /// Whole-number discount relative to the original price.
    ///
    /// Returns `None` unless both prices parse and the original is higher.
    #[must_use]
    pub fn discount_percent(&self) -> Option<u32> {
        let price = self.price_decimal()?;
        let original = self.original_price_decimal()?;
        if original <= Decimal::ZERO || price >= original {
            return None;
        }
        ((original - price) / original * Decimal::ONE_HUNDRED)
            .round()
            .to_u32()
    }
}

fn parse_decimal(raw: &str) -> Option<Decimal> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Decimal::from_str(trimmed).ok()
}
