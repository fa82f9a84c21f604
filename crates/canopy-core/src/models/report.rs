//! Sales reporting domain model.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Aggregate of one dispensary's orders for one business day.
///
/// Always recomputed from source orders; a second run for the same day
/// replaces the stored row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DailySalesReport {
    pub tenant_id: Uuid,
    pub dispensary_id: Uuid,
    pub date: NaiveDate,
    /// Number of completed orders.
    pub total_orders: u64,
    pub total_revenue: f64,
    pub total_tax: f64,
    pub total_excise_tax: f64,
    pub items_sold: f64,
    pub unique_customers: u64,
    pub cancelled_orders: u64,
    pub refunded_amount: f64,
    pub average_order_value: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Day,
    Week,
    Month,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RevenueBucket {
    /// First day of the bucket (the Monday for weeks, the 1st for months).
    pub period_start: NaiveDate,
    pub revenue: f64,
    pub order_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductRevenue {
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity_sold: f64,
    pub revenue: f64,
}
