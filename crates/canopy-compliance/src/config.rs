//! Compliance configuration.

use std::collections::HashMap;

use canopy_core::models::order::{OrderStatus, ProductCategory};
use chrono::{FixedOffset, Offset, Utc};

/// Daily purchase limit applied when no jurisdiction-specific limit is set.
pub const DEFAULT_DAILY_LIMIT_GRAMS: f64 = 85.0;

/// Which of a customer's orders count toward their daily total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum QuotaStatusPolicy {
    /// Every order counts, whatever its status.
    #[default]
    CountAll,
    /// Cancelled and refunded orders are ignored.
    ExcludeVoided,
}

impl QuotaStatusPolicy {
    pub fn counts(&self, status: OrderStatus) -> bool {
        match self {
            QuotaStatusPolicy::CountAll => true,
            QuotaStatusPolicy::ExcludeVoided => !status.is_voided(),
        }
    }
}

/// Configuration shared by the compliance services.
#[derive(Debug, Clone)]
pub struct ComplianceConfig {
    /// Daily limits in grams keyed by (jurisdiction, category).
    /// Jurisdiction codes are stored uppercase.
    pub purchase_limits: HashMap<(String, ProductCategory), f64>,
    /// Limit used when `purchase_limits` has no entry (default: 85 g).
    pub default_limit_grams: f64,
    /// Offset that defines the business day for both quotas and reports
    /// (default: UTC).
    pub business_day_offset: FixedOffset,
    /// Status filter for quota totals (default: count everything).
    pub quota_status_policy: QuotaStatusPolicy,
    /// Attempts at appending to a chain before giving up on sequence
    /// conflicts (default: 5).
    pub max_chain_retries: u32,
    /// Entries fetched per page while verifying a chain (default: 500).
    pub verify_page_size: u64,
}

impl Default for ComplianceConfig {
    fn default() -> Self {
        Self {
            purchase_limits: HashMap::new(),
            default_limit_grams: DEFAULT_DAILY_LIMIT_GRAMS,
            business_day_offset: Utc.fix(),
            quota_status_policy: QuotaStatusPolicy::default(),
            max_chain_retries: 5,
            verify_page_size: 500,
        }
    }
}

impl ComplianceConfig {
    /// Set the daily limit for one category in one jurisdiction.
    pub fn with_limit(
        mut self,
        jurisdiction: &str,
        category: ProductCategory,
        grams: f64,
    ) -> Self {
        self.purchase_limits
            .insert((jurisdiction.to_ascii_uppercase(), category), grams);
        self
    }

    /// The daily limit in grams for a jurisdiction and category.
    pub fn limit_for(&self, jurisdiction: &str, category: ProductCategory) -> f64 {
        self.purchase_limits
            .get(&(jurisdiction.to_ascii_uppercase(), category))
            .copied()
            .unwrap_or(self.default_limit_grams)
    }
}
