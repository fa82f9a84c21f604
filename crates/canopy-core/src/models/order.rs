//! Order domain model.
//!
//! Orders belong to the commerce collaborators. The compliance core reads
//! them to compute quotas and reports, creates them through order
//! placement, and moves them to `Completed` / `Refunded`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CanopyError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Preparing,
    Ready,
    Completed,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::Preparing => "PREPARING",
            OrderStatus::Ready => "READY",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Refunded => "REFUNDED",
        }
    }

    /// Cancelled or refunded: the goods did not (or no longer) leave the store.
    pub fn is_voided(&self) -> bool {
        matches!(self, OrderStatus::Cancelled | OrderStatus::Refunded)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = CanopyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(OrderStatus::Pending),
            "CONFIRMED" => Ok(OrderStatus::Confirmed),
            "PREPARING" => Ok(OrderStatus::Preparing),
            "READY" => Ok(OrderStatus::Ready),
            "COMPLETED" => Ok(OrderStatus::Completed),
            "CANCELLED" => Ok(OrderStatus::Cancelled),
            "REFUNDED" => Ok(OrderStatus::Refunded),
            other => Err(CanopyError::Validation {
                message: format!("unknown order status: {other}"),
            }),
        }
    }
}

/// Product category used to select the applicable purchase limit.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProductCategory {
    #[default]
    Flower,
    Concentrate,
    Edible,
    Topical,
    Other,
}

impl ProductCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductCategory::Flower => "flower",
            ProductCategory::Concentrate => "concentrate",
            ProductCategory::Edible => "edible",
            ProductCategory::Topical => "topical",
            ProductCategory::Other => "other",
        }
    }
}

impl fmt::Display for ProductCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProductCategory {
    type Err = CanopyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "flower" => Ok(ProductCategory::Flower),
            "concentrate" => Ok(ProductCategory::Concentrate),
            "edible" => Ok(ProductCategory::Edible),
            "topical" => Ok(ProductCategory::Topical),
            "other" => Ok(ProductCategory::Other),
            other => Err(CanopyError::Validation {
                message: format!("unknown product category: {other}"),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderItem {
    pub product_id: Uuid,
    pub product_name: String,
    pub variant_name: String,
    #[serde(default)]
    pub category: ProductCategory,
    /// Purchased amount in grams; this is what purchase limits count.
    pub quantity: f64,
    /// Package weight as labelled, informational only.
    pub weight: Option<f64>,
    pub unit_price: f64,
    pub batch_number: String,
    pub license_number: String,
}

impl OrderItem {
    pub fn line_total(&self) -> f64 {
        self.quantity * self.unit_price
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub dispensary_id: Uuid,
    pub customer_id: Uuid,
    pub order_number: String,
    pub status: OrderStatus,
    pub items: Vec<OrderItem>,
    pub subtotal: f64,
    pub tax: f64,
    pub excise_tax: f64,
    pub total: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Sum of item quantities (grams) for one category.
    pub fn grams_in(&self, category: ProductCategory) -> f64 {
        self.items
            .iter()
            .filter(|item| item.category == category)
            .map(|item| item.quantity)
            .sum()
    }
}

/// Fields required to create a new order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrder {
    pub tenant_id: Uuid,
    pub dispensary_id: Uuid,
    pub customer_id: Uuid,
    pub order_number: String,
    pub items: Vec<OrderItem>,
    pub subtotal: f64,
    pub tax: f64,
    pub excise_tax: f64,
    pub total: f64,
    /// Defaults to `Pending`.
    pub status: Option<OrderStatus>,
    /// Defaults to the current time. Set explicitly when importing history.
    pub created_at: Option<DateTime<Utc>>,
}
