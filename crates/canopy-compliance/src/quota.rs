//! Purchase-quota checker.
//!
//! A check sums the grams a customer has already ordered today at a
//! dispensary, compares the total plus the request against the
//! jurisdiction's limit and records the outcome as a
//! PURCHASE_LIMIT_CHECK event, whether it passes or not. The checker
//! only decides; enforcing the decision is up to the caller.

use std::sync::Arc;

use canopy_core::context::TenantContext;
use canopy_core::error::{CanopyError, CanopyResult};
use canopy_core::models::compliance::{ComplianceEvent, PurchaseLimitCheckDetails};
use canopy_core::models::order::ProductCategory;
use canopy_core::repository::{ComplianceLogRepository, OrderRepository};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::OwnedMutexGuard;
use tracing::{info, warn};
use uuid::Uuid;

use crate::audit::AuditLogWriter;
use crate::config::ComplianceConfig;
use crate::day;
use crate::locks::KeyedLocks;

/// Quantities are compared in whole milligrams so float noise in
/// summed gram values cannot flip a decision at the boundary.
fn to_milligrams(grams: f64) -> i64 {
    (grams * 1000.0).round() as i64
}

fn from_milligrams(mg: i64) -> f64 {
    mg as f64 / 1000.0
}

/// A request to buy `requested_grams` of one category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaRequest {
    pub dispensary_id: Uuid,
    pub customer_id: Uuid,
    pub requested_grams: f64,
    #[serde(default)]
    pub category: ProductCategory,
}

/// Result of a quota check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuotaDecision {
    pub within_limit: bool,
    /// Grams already purchased today in this category.
    pub daily_total: f64,
    pub limit: f64,
    pub requested: f64,
    pub category: ProductCategory,
}

/// Quota decisions made while holding the customer's daily lock.
///
/// No other reservation for the same customer and business day can be
/// made until this is dropped, so the caller should keep it alive until
/// the order it authorizes has been written.
#[derive(Debug)]
pub struct QuotaReservation {
    decisions: Vec<QuotaDecision>,
    _guard: OwnedMutexGuard<()>,
}

impl QuotaReservation {
    pub fn decisions(&self) -> &[QuotaDecision] {
        &self.decisions
    }

    pub fn within_limit(&self) -> bool {
        self.decisions.iter().all(|d| d.within_limit)
    }

    /// The first decision that went over its limit.
    pub fn first_exceeded(&self) -> Option<&QuotaDecision> {
        self.decisions.iter().find(|d| !d.within_limit)
    }
}

/// Checks customers' daily purchases against jurisdiction limits.
#[derive(Clone)]
pub struct PurchaseQuotaChecker<O: OrderRepository, L: ComplianceLogRepository> {
    order_repo: O,
    audit: AuditLogWriter<L>,
    config: Arc<ComplianceConfig>,
    customer_locks: Arc<KeyedLocks<(Uuid, Uuid, NaiveDate)>>,
}

impl<O: OrderRepository, L: ComplianceLogRepository> PurchaseQuotaChecker<O, L> {
    pub fn new(order_repo: O, audit: AuditLogWriter<L>, config: Arc<ComplianceConfig>) -> Self {
        Self {
            order_repo,
            audit,
            config,
            customer_locks: Arc::new(KeyedLocks::new()),
        }
    }

    /// Advisory check for today's business day. Takes no lock.
    pub async fn check(
        &self,
        ctx: &TenantContext,
        request: &QuotaRequest,
    ) -> CanopyResult<QuotaDecision> {
        let today = day::business_date(Utc::now(), self.config.business_day_offset);
        self.evaluate(ctx, request, today).await
    }

    /// Check one request and hold the customer's daily lock on success or
    /// failure alike.
    pub async fn reserve(
        &self,
        ctx: &TenantContext,
        request: &QuotaRequest,
    ) -> CanopyResult<QuotaReservation> {
        self.reserve_many(ctx, std::slice::from_ref(request)).await
    }

    /// Check several requests for the same customer under one lock.
    pub async fn reserve_many(
        &self,
        ctx: &TenantContext,
        requests: &[QuotaRequest],
    ) -> CanopyResult<QuotaReservation> {
        let customer_id = match requests {
            [first, rest @ ..] => {
                if rest.iter().any(|r| r.customer_id != first.customer_id) {
                    return Err(CanopyError::Validation {
                        message: "a reservation covers a single customer".into(),
                    });
                }
                first.customer_id
            }
            [] => {
                return Err(CanopyError::Validation {
                    message: "nothing to reserve".into(),
                });
            }
        };

        let today = day::business_date(Utc::now(), self.config.business_day_offset);
        let guard = self
            .customer_locks
            .lock((ctx.tenant_id(), customer_id, today))
            .await;

        let mut decisions = Vec::with_capacity(requests.len());
        for request in requests {
            decisions.push(self.evaluate(ctx, request, today).await?);
        }

        Ok(QuotaReservation {
            decisions,
            _guard: guard,
        })
    }

    async fn evaluate(
        &self,
        ctx: &TenantContext,
        request: &QuotaRequest,
        date: NaiveDate,
    ) -> CanopyResult<QuotaDecision> {
        if !request.requested_grams.is_finite() || request.requested_grams < 0.0 {
            return Err(CanopyError::Validation {
                message: format!(
                    "requested weight must be a non-negative number of grams, got {}",
                    request.requested_grams
                ),
            });
        }

        let (start, end) = day::day_window(date, self.config.business_day_offset);
        let orders = self
            .order_repo
            .list_by_customer(
                ctx.tenant_id(),
                request.dispensary_id,
                request.customer_id,
                start,
                end,
            )
            .await?;

        let policy = self.config.quota_status_policy;
        let total_mg: i64 = orders
            .iter()
            .filter(|order| policy.counts(order.status))
            .map(|order| to_milligrams(order.grams_in(request.category)))
            .sum();
        let requested_mg = to_milligrams(request.requested_grams);
        let limit = self.config.limit_for(ctx.jurisdiction(), request.category);

        let decision = QuotaDecision {
            within_limit: total_mg + requested_mg <= to_milligrams(limit),
            daily_total: from_milligrams(total_mg),
            limit,
            requested: request.requested_grams,
            category: request.category,
        };

        self.audit
            .record(
                ctx,
                request.dispensary_id,
                ComplianceEvent::PurchaseLimitCheck(PurchaseLimitCheckDetails {
                    customer_id: request.customer_id,
                    daily_total: decision.daily_total,
                    requested_weight: decision.requested,
                    within_limit: decision.within_limit,
                    limit: decision.limit,
                }),
                None,
                None,
            )
            .await?;

        if decision.within_limit {
            info!(
                tenant_id = %ctx.tenant_id(),
                customer_id = %request.customer_id,
                category = %request.category,
                daily_total = decision.daily_total,
                requested = decision.requested,
                "Purchase within daily limit"
            );
        } else {
            warn!(
                tenant_id = %ctx.tenant_id(),
                customer_id = %request.customer_id,
                category = %request.category,
                daily_total = decision.daily_total,
                requested = decision.requested,
                limit = decision.limit,
                "Purchase would exceed daily limit"
            );
        }

        Ok(decision)
    }
}
