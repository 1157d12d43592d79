//! Order payloads.
//!
//! These mirror what the order service returns to clients after checkout;
//! the realtime layer only forwards them.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single line of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    /// Catalog product id.
    pub product_id: i64,
    /// Product name at the time of purchase.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Quantity ordered.
    pub quantity: u32,
    /// Unit price at the time of purchase.
    #[serde(default)]
    pub price: Option<Decimal>,
}

impl OrderItem {
    /// Line total, if the unit price is known.
    pub fn line_total(&self) -> Option<Decimal> {
        self.price.map(|p| p * Decimal::from(self.quantity))
    }
}

/// A placed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    /// Owner reference (user id or guest token).
    pub owner_id: String,
    pub total: Decimal,
    pub status: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    pub delivery_type: String,
    pub payment_type: String,
    /// Cash amount the customer pays with, for change calculation.
    #[serde(default)]
    pub change_for: Option<Decimal>,
    #[serde(default)]
    pub delivery_fee: Option<Decimal>,
    #[serde(default)]
    pub delivery_text: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub items: Vec<OrderItem>,
}

impl Order {
    /// Total quantity across all lines.
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|i| i.quantity).sum()
    }
}
