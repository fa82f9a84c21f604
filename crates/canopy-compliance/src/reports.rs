//! Daily sales aggregation and revenue reporting.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use canopy_core::context::TenantContext;
use canopy_core::error::{CanopyError, CanopyResult};
use canopy_core::models::order::{Order, OrderStatus};
use canopy_core::models::report::{DailySalesReport, Granularity, ProductRevenue, RevenueBucket};
use canopy_core::repository::{DailySalesReportRepository, OrderRepository};
use chrono::{FixedOffset, NaiveDate};
use tracing::{error, info};
use uuid::Uuid;

use crate::config::ComplianceConfig;
use crate::day;

/// Round a money value to cents.
pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn generation_failure(
    ctx: &TenantContext,
    dispensary_id: Uuid,
    date: NaiveDate,
    err: CanopyError,
) -> CanopyError {
    error!(
        tenant_id = %ctx.tenant_id(),
        %dispensary_id,
        %date,
        error = %err,
        "Daily report generation failed"
    );
    CanopyError::ReportGenerationFailure(err.to_string())
}

fn check_dates(from: NaiveDate, to: NaiveDate) -> CanopyResult<()> {
    if from > to {
        return Err(CanopyError::Validation {
            message: format!("from ({from}) is after to ({to})"),
        });
    }
    Ok(())
}

/// Compute one day's report from that day's orders.
///
/// Revenue, taxes, items and customers cover completed orders only.
pub fn summarize(
    tenant_id: Uuid,
    dispensary_id: Uuid,
    date: NaiveDate,
    orders: &[Order],
) -> DailySalesReport {
    let completed: Vec<&Order> = orders
        .iter()
        .filter(|o| o.status == OrderStatus::Completed)
        .collect();

    let total_revenue: f64 = completed.iter().map(|o| o.total).sum();
    let total_tax: f64 = completed.iter().map(|o| o.tax).sum();
    let total_excise_tax: f64 = completed.iter().map(|o| o.excise_tax).sum();
    let items_sold: f64 = completed
        .iter()
        .flat_map(|o| o.items.iter())
        .map(|item| item.quantity)
        .sum();
    let unique_customers = completed
        .iter()
        .map(|o| o.customer_id)
        .collect::<HashSet<_>>()
        .len() as u64;
    let cancelled_orders = orders
        .iter()
        .filter(|o| o.status == OrderStatus::Cancelled)
        .count() as u64;
    let refunded_amount: f64 = orders
        .iter()
        .filter(|o| o.status == OrderStatus::Refunded)
        .map(|o| o.total)
        .sum();

    let total_orders = completed.len() as u64;
    let average_order_value = if total_orders == 0 {
        0.0
    } else {
        total_revenue / total_orders as f64
    };

    DailySalesReport {
        tenant_id,
        dispensary_id,
        date,
        total_orders,
        total_revenue: round_cents(total_revenue),
        total_tax: round_cents(total_tax),
        total_excise_tax: round_cents(total_excise_tax),
        items_sold,
        unique_customers,
        cancelled_orders,
        refunded_amount: round_cents(refunded_amount),
        average_order_value: round_cents(average_order_value),
    }
}

fn period_start(date: NaiveDate, granularity: Granularity) -> NaiveDate {
    match granularity {
        Granularity::Day => date,
        Granularity::Week => day::week_start(date),
        Granularity::Month => day::month_start(date),
    }
}

/// Revenue of completed orders bucketed by business period, oldest first.
pub fn bucket_revenue(
    orders: &[Order],
    granularity: Granularity,
    offset: FixedOffset,
) -> Vec<RevenueBucket> {
    let mut buckets: BTreeMap<NaiveDate, (f64, u64)> = BTreeMap::new();
    for order in orders.iter().filter(|o| o.status == OrderStatus::Completed) {
        let start = period_start(day::business_date(order.created_at, offset), granularity);
        let bucket = buckets.entry(start).or_insert((0.0, 0));
        bucket.0 += order.items.iter().map(|item| item.line_total()).sum::<f64>();
        bucket.1 += 1;
    }
    buckets
        .into_iter()
        .map(|(period_start, (revenue, order_count))| RevenueBucket {
            period_start,
            revenue: round_cents(revenue),
            order_count,
        })
        .collect()
}

/// Products of completed orders ranked by line-item revenue.
pub fn rank_products(orders: &[Order], limit: usize) -> Vec<ProductRevenue> {
    let mut by_product: HashMap<Uuid, ProductRevenue> = HashMap::new();
    for item in orders
        .iter()
        .filter(|o| o.status == OrderStatus::Completed)
        .flat_map(|o| o.items.iter())
    {
        let entry = by_product
            .entry(item.product_id)
            .or_insert_with(|| ProductRevenue {
                product_id: item.product_id,
                product_name: item.product_name.clone(),
                quantity_sold: 0.0,
                revenue: 0.0,
            });
        entry.quantity_sold += item.quantity;
        entry.revenue += item.line_total();
    }

    let mut ranked: Vec<ProductRevenue> = by_product
        .into_values()
        .map(|mut p| {
            p.revenue = round_cents(p.revenue);
            p
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.revenue
            .total_cmp(&a.revenue)
            .then_with(|| a.product_name.cmp(&b.product_name))
    });
    ranked.truncate(limit);
    ranked
}

/// Builds and reads daily sales reports.
#[derive(Clone)]
pub struct DailySalesAggregator<O: OrderRepository, R: DailySalesReportRepository> {
    order_repo: O,
    report_repo: R,
    config: Arc<ComplianceConfig>,
}

impl<O: OrderRepository, R: DailySalesReportRepository> DailySalesAggregator<O, R> {
    pub fn new(order_repo: O, report_repo: R, config: Arc<ComplianceConfig>) -> Self {
        Self {
            order_repo,
            report_repo,
            config,
        }
    }

    /// Recompute the report for one dispensary and business date and
    /// store it, replacing any earlier run.
    pub async fn generate_daily_report(
        &self,
        ctx: &TenantContext,
        dispensary_id: Uuid,
        date: NaiveDate,
    ) -> CanopyResult<DailySalesReport> {
        let (start, end) = day::day_window(date, self.config.business_day_offset);
        let orders = self
            .order_repo
            .list_by_dispensary(ctx.tenant_id(), dispensary_id, start, end)
            .await
            .map_err(|e| generation_failure(ctx, dispensary_id, date, e))?;

        let report = summarize(ctx.tenant_id(), dispensary_id, date, &orders);
        let report = self
            .report_repo
            .upsert(report)
            .await
            .map_err(|e| generation_failure(ctx, dispensary_id, date, e))?;

        info!(
            tenant_id = %ctx.tenant_id(),
            %dispensary_id,
            %date,
            total_orders = report.total_orders,
            total_revenue = report.total_revenue,
            "Daily sales report generated"
        );
        Ok(report)
    }

    pub async fn get_report(
        &self,
        ctx: &TenantContext,
        dispensary_id: Uuid,
        date: NaiveDate,
    ) -> CanopyResult<DailySalesReport> {
        self.report_repo
            .get(ctx.tenant_id(), dispensary_id, date)
            .await
    }

    /// Stored reports for `from..=to`, oldest first.
    pub async fn list_reports(
        &self,
        ctx: &TenantContext,
        dispensary_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> CanopyResult<Vec<DailySalesReport>> {
        check_dates(from, to)?;
        self.report_repo
            .list(ctx.tenant_id(), dispensary_id, from, to)
            .await
    }

    /// Revenue for the business dates `from..=to` in day, week or month
    /// buckets. Periods without completed orders are omitted.
    pub async fn revenue_by_period(
        &self,
        ctx: &TenantContext,
        dispensary_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
        granularity: Granularity,
    ) -> CanopyResult<Vec<RevenueBucket>> {
        check_dates(from, to)?;
        let offset = self.config.business_day_offset;
        let (start, end) = day::range_window(from, to, offset);
        let orders = self
            .order_repo
            .list_by_dispensary(ctx.tenant_id(), dispensary_id, start, end)
            .await?;
        Ok(bucket_revenue(&orders, granularity, offset))
    }

    /// The `limit` best-selling products for `from..=to` by revenue.
    pub async fn top_products(
        &self,
        ctx: &TenantContext,
        dispensary_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
        limit: usize,
    ) -> CanopyResult<Vec<ProductRevenue>> {
        check_dates(from, to)?;
        let (start, end) = day::range_window(from, to, self.config.business_day_offset);
        let orders = self
            .order_repo
            .list_by_dispensary(ctx.tenant_id(), dispensary_id, start, end)
            .await?;
        Ok(rank_products(&orders, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canopy_core::models::order::{OrderItem, ProductCategory};
    use chrono::{DateTime, TimeZone, Utc};

    fn item(name: &str, quantity: f64, unit_price: f64) -> OrderItem {
        OrderItem {
            product_id: Uuid::from_u128(name.bytes().fold(0, |acc, b| acc * 256 + u128::from(b))),
            product_name: name.into(),
            variant_name: "default".into(),
            category: ProductCategory::Flower,
            quantity,
            weight: None,
            unit_price,
            batch_number: "B-1".into(),
            license_number: "L-1".into(),
        }
    }

    fn order(status: OrderStatus, total: f64, at: DateTime<Utc>, items: Vec<OrderItem>) -> Order {
        Order {
            id: Uuid::new_v4(),
            tenant_id: Uuid::nil(),
            dispensary_id: Uuid::nil(),
            customer_id: Uuid::new_v4(),
            order_number: "ORD".into(),
            status,
            items,
            subtotal: total,
            tax: 0.0,
            excise_tax: 0.0,
            total,
            created_at: at,
            updated_at: at,
        }
    }

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, day, hour, 0, 0).unwrap()
    }

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    #[test]
    fn average_is_zero_without_completed_orders() {
        let orders = vec![order(OrderStatus::Cancelled, 30.0, at(10, 9), vec![])];
        let report = summarize(Uuid::nil(), Uuid::nil(), at(10, 0).date_naive(), &orders);
        assert_eq!(report.total_orders, 0);
        assert_eq!(report.average_order_value, 0.0);
        assert_eq!(report.cancelled_orders, 1);
    }

    #[test]
    fn money_is_rounded_to_cents() {
        let orders = vec![
            order(OrderStatus::Completed, 10.0, at(10, 9), vec![]),
            order(OrderStatus::Completed, 10.0, at(10, 10), vec![]),
            order(OrderStatus::Completed, 13.33, at(10, 11), vec![]),
        ];
        let report = summarize(Uuid::nil(), Uuid::nil(), at(10, 0).date_naive(), &orders);
        assert_eq!(report.total_revenue, 33.33);
        assert_eq!(report.average_order_value, 11.11);
    }

    #[test]
    fn refunded_totals_are_summed_separately() {
        let orders = vec![
            order(OrderStatus::Completed, 50.0, at(10, 9), vec![]),
            order(OrderStatus::Refunded, 20.0, at(10, 10), vec![]),
            order(OrderStatus::Refunded, 5.5, at(10, 11), vec![]),
        ];
        let report = summarize(Uuid::nil(), Uuid::nil(), at(10, 0).date_naive(), &orders);
        assert_eq!(report.total_revenue, 50.0);
        assert_eq!(report.refunded_amount, 25.5);
    }

    #[test]
    fn weekly_buckets_start_on_monday() {
        let orders = vec![
            // Sunday 8th belongs to the week of Monday 2nd.
            order(OrderStatus::Completed, 0.0, at(8, 12), vec![item("A", 1.0, 10.0)]),
            order(OrderStatus::Completed, 0.0, at(9, 12), vec![item("A", 2.0, 10.0)]),
            order(OrderStatus::Completed, 0.0, at(15, 12), vec![item("B", 1.0, 5.0)]),
            order(OrderStatus::Cancelled, 0.0, at(10, 12), vec![item("C", 9.0, 9.0)]),
        ];
        let buckets = bucket_revenue(&orders, Granularity::Week, utc());
        let summary: Vec<(u32, f64, u64)> = buckets
            .iter()
            .map(|b| (chrono::Datelike::day(&b.period_start), b.revenue, b.order_count))
            .collect();
        assert_eq!(summary, vec![(2, 10.0, 1), (9, 25.0, 2)]);
    }

    #[test]
    fn products_ranked_by_revenue() {
        let orders = vec![
            order(
                OrderStatus::Completed,
                0.0,
                at(10, 9),
                vec![item("Cheap", 10.0, 1.0), item("Pricey", 1.0, 60.0)],
            ),
            order(OrderStatus::Completed, 0.0, at(10, 10), vec![item("Cheap", 5.0, 1.0)]),
            order(OrderStatus::Refunded, 0.0, at(10, 11), vec![item("Ghost", 1.0, 999.0)]),
        ];
        let ranked = rank_products(&orders, 5);
        let names: Vec<&str> = ranked.iter().map(|p| p.product_name.as_str()).collect();
        assert_eq!(names, vec!["Pricey", "Cheap"]);
        assert_eq!(ranked[1].quantity_sold, 15.0);
        assert_eq!(ranked[1].revenue, 15.0);

        assert_eq!(rank_products(&orders, 1).len(), 1);
    }
}
