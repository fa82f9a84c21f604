//! Order placement, completion and refund.
//!
//! Placement enforces the purchase quota; completion and refund write the
//! SALE and RETURN events. A status change whose audit event cannot be
//! written is rolled back.

use canopy_core::context::TenantContext;
use canopy_core::error::{CanopyError, CanopyResult};
use canopy_core::models::compliance::{ComplianceEvent, ReturnDetails, SaleDetails, SaleLine};
use canopy_core::models::order::{CreateOrder, Order, OrderItem, OrderStatus, ProductCategory};
use canopy_core::repository::{ComplianceLogRepository, OrderRepository};
use std::sync::Arc;

use serde::Deserialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::audit::AuditLogWriter;
use crate::locks::KeyedLocks;
use crate::quota::{PurchaseQuotaChecker, QuotaRequest};

/// Input for placing an order.
#[derive(Debug, Clone, Deserialize)]
pub struct PlaceOrder {
    pub dispensary_id: Uuid,
    pub customer_id: Uuid,
    pub order_number: String,
    pub items: Vec<OrderItem>,
    pub subtotal: f64,
    pub tax: f64,
    pub excise_tax: f64,
    pub total: f64,
}

fn non_negative(what: &str, value: f64) -> CanopyResult<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(CanopyError::Validation {
            message: format!("{what} must be a non-negative number, got {value}"),
        });
    }
    Ok(())
}

impl PlaceOrder {
    /// Reject orders whose shape or amounts cannot be trusted. Every line
    /// is checked on its own so one line cannot offset another in the
    /// quota sum.
    pub fn validate(&self) -> CanopyResult<()> {
        if self.items.is_empty() {
            return Err(CanopyError::Validation {
                message: "an order needs at least one item".into(),
            });
        }
        if self.order_number.trim().is_empty() {
            return Err(CanopyError::Validation {
                message: "order number must not be empty".into(),
            });
        }
        for item in &self.items {
            non_negative("item quantity", item.quantity)?;
            non_negative("item unit price", item.unit_price)?;
            if let Some(weight) = item.weight {
                non_negative("item weight", weight)?;
            }
        }
        non_negative("subtotal", self.subtotal)?;
        non_negative("tax", self.tax)?;
        non_negative("excise tax", self.excise_tax)?;
        non_negative("total", self.total)
    }
}

/// Grams per category, in the order categories first appear.
fn grams_by_category(items: &[OrderItem]) -> Vec<(ProductCategory, f64)> {
    let mut totals: Vec<(ProductCategory, f64)> = Vec::new();
    for item in items {
        match totals.iter_mut().find(|(c, _)| *c == item.category) {
            Some((_, grams)) => *grams += item.quantity,
            None => totals.push((item.category, item.quantity)),
        }
    }
    totals
}

fn sale_details(order: &Order) -> SaleDetails {
    SaleDetails {
        order_id: order.id,
        order_number: order.order_number.clone(),
        items: order
            .items
            .iter()
            .map(|item| SaleLine {
                product_name: item.product_name.clone(),
                variant_name: item.variant_name.clone(),
                quantity: item.quantity,
                unit_price: item.unit_price,
                line_total: item.line_total(),
                batch_number: item.batch_number.clone(),
                license_number: item.license_number.clone(),
            })
            .collect(),
        subtotal: order.subtotal,
        tax: order.tax,
        excise_tax: order.excise_tax,
        total: order.total,
    }
}

/// Orchestrates the order lifecycle steps that carry compliance duties.
///
/// Status transitions of one order are serialized, so a completion or
/// refund always sees the status its own write replaces.
pub struct SalesService<O: OrderRepository, L: ComplianceLogRepository> {
    order_repo: O,
    audit: AuditLogWriter<L>,
    quota: PurchaseQuotaChecker<O, L>,
    order_locks: Arc<KeyedLocks<(Uuid, Uuid)>>,
}

impl<O: OrderRepository, L: ComplianceLogRepository> SalesService<O, L> {
    pub fn new(order_repo: O, audit: AuditLogWriter<L>, quota: PurchaseQuotaChecker<O, L>) -> Self {
        Self {
            order_repo,
            audit,
            quota,
            order_locks: Arc::new(KeyedLocks::new()),
        }
    }

    /// Check every category of the order against today's limits and
    /// create it as PENDING. The customer's quota lock is held until the
    /// order row exists.
    pub async fn place_order(&self, ctx: &TenantContext, input: PlaceOrder) -> CanopyResult<Order> {
        input.validate()?;

        let requests: Vec<QuotaRequest> = grams_by_category(&input.items)
            .into_iter()
            .map(|(category, grams)| QuotaRequest {
                dispensary_id: input.dispensary_id,
                customer_id: input.customer_id,
                requested_grams: grams,
                category,
            })
            .collect();
        let reservation = self.quota.reserve_many(ctx, &requests).await?;

        if let Some(exceeded) = reservation.first_exceeded() {
            return Err(CanopyError::PurchaseLimitExceeded {
                daily_total: exceeded.daily_total,
                requested: exceeded.requested,
                limit: exceeded.limit,
            });
        }

        let order = self
            .order_repo
            .create(CreateOrder {
                tenant_id: ctx.tenant_id(),
                dispensary_id: input.dispensary_id,
                customer_id: input.customer_id,
                order_number: input.order_number,
                items: input.items,
                subtotal: input.subtotal,
                tax: input.tax,
                excise_tax: input.excise_tax,
                total: input.total,
                status: Some(OrderStatus::Pending),
                created_at: None,
            })
            .await?;
        drop(reservation);

        info!(
            tenant_id = %ctx.tenant_id(),
            order_id = %order.id,
            order_number = %order.order_number,
            "Order placed"
        );
        Ok(order)
    }

    /// Mark an order COMPLETED and record the SALE event.
    pub async fn complete_order(
        &self,
        ctx: &TenantContext,
        order_id: Uuid,
        actor_id: Option<Uuid>,
    ) -> CanopyResult<Order> {
        let _guard = self.order_locks.lock((ctx.tenant_id(), order_id)).await;
        let order = self.order_repo.get_by_id(ctx.tenant_id(), order_id).await?;
        if order.status == OrderStatus::Completed || order.status.is_voided() {
            return Err(CanopyError::Validation {
                message: format!(
                    "order {} is {} and cannot be completed",
                    order.id, order.status
                ),
            });
        }

        let completed = self
            .order_repo
            .update_status(ctx.tenant_id(), order_id, OrderStatus::Completed)
            .await?;
        let event = ComplianceEvent::Sale(sale_details(&completed));
        self.record_or_restore(ctx, &completed, order.status, event, actor_id)
            .await?;

        info!(
            tenant_id = %ctx.tenant_id(),
            %order_id,
            total = completed.total,
            "Order completed"
        );
        Ok(completed)
    }

    /// Mark a completed order REFUNDED and record the RETURN event.
    pub async fn refund_order(
        &self,
        ctx: &TenantContext,
        order_id: Uuid,
        reason: String,
        actor_id: Option<Uuid>,
    ) -> CanopyResult<Order> {
        let _guard = self.order_locks.lock((ctx.tenant_id(), order_id)).await;
        let order = self.order_repo.get_by_id(ctx.tenant_id(), order_id).await?;
        if order.status != OrderStatus::Completed {
            return Err(CanopyError::Validation {
                message: format!(
                    "order {} is {}; only completed orders can be refunded",
                    order.id, order.status
                ),
            });
        }

        let refunded = self
            .order_repo
            .update_status(ctx.tenant_id(), order_id, OrderStatus::Refunded)
            .await?;
        let event = ComplianceEvent::Return(ReturnDetails {
            order_id: refunded.id,
            order_number: refunded.order_number.clone(),
            refund_amount: refunded.total,
            reason,
        });
        self.record_or_restore(ctx, &refunded, order.status, event, actor_id)
            .await?;

        info!(
            tenant_id = %ctx.tenant_id(),
            %order_id,
            refund_amount = refunded.total,
            "Order refunded"
        );
        Ok(refunded)
    }

    /// Write the audit event for a status change, putting the previous
    /// status back if the write fails.
    async fn record_or_restore(
        &self,
        ctx: &TenantContext,
        order: &Order,
        previous: OrderStatus,
        event: ComplianceEvent,
        actor_id: Option<Uuid>,
    ) -> CanopyResult<()> {
        let event_type = event.event_type();
        let Err(err) = self
            .audit
            .record(ctx, order.dispensary_id, event, actor_id, Some(order.id))
            .await
        else {
            return Ok(());
        };

        warn!(
            tenant_id = %ctx.tenant_id(),
            order_id = %order.id,
            event_type = %event_type,
            restoring = %previous,
            "Audit write failed, restoring order status"
        );
        if let Err(restore_err) = self
            .order_repo
            .update_status(ctx.tenant_id(), order.id, previous)
            .await
        {
            error!(
                tenant_id = %ctx.tenant_id(),
                order_id = %order.id,
                error = %restore_err,
                "Failed to restore order status after audit failure"
            );
        }

        Err(match err {
            CanopyError::AuditWriteFailure(_) => err,
            other => CanopyError::AuditWriteFailure(other.to_string()),
        })
    }
}
