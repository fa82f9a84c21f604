//! SurrealDB implementation of [`DailySalesReportRepository`].
//!
//! The record id is derived from `(tenant_id, dispensary_id, date)`, so an upsert for
//! the same day always lands on the same record.

use canopy_core::error::CanopyResult;
use canopy_core::models::report::DailySalesReport;
use canopy_core::repository::DailySalesReportRepository;
use chrono::NaiveDate;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::parse_uuid;
use crate::error::DbError;

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, SurrealValue)]
struct DailySalesReportRow {
    tenant_id: String,
    dispensary_id: String,
    date: String,
    total_orders: u64,
    total_revenue: f64,
    total_tax: f64,
    total_excise_tax: f64,
    items_sold: f64,
    unique_customers: u64,
    cancelled_orders: u64,
    refunded_amount: f64,
    average_order_value: f64,
}

impl DailySalesReportRow {
    fn try_into_report(self) -> Result<DailySalesReport, DbError> {
        let date = NaiveDate::parse_from_str(&self.date, DATE_FORMAT)
            .map_err(|e| DbError::Decode(format!("invalid report date: {e}")))?;
        Ok(DailySalesReport {
            tenant_id: parse_uuid(&self.tenant_id, "tenant")?,
            dispensary_id: parse_uuid(&self.dispensary_id, "dispensary")?,
            date,
            total_orders: self.total_orders,
            total_revenue: self.total_revenue,
            total_tax: self.total_tax,
            total_excise_tax: self.total_excise_tax,
            items_sold: self.items_sold,
            unique_customers: self.unique_customers,
            cancelled_orders: self.cancelled_orders,
            refunded_amount: self.refunded_amount,
            average_order_value: self.average_order_value,
        })
    }
}

fn report_record_id(tenant_id: Uuid, dispensary_id: Uuid, date: NaiveDate) -> String {
    format!("{tenant_id}_{dispensary_id}_{}", date.format(DATE_FORMAT))
}

/// SurrealDB implementation of the daily sales report repository.
pub struct SurrealDailySalesReportRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> Clone for SurrealDailySalesReportRepository<C> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
        }
    }
}

impl<C: Connection> SurrealDailySalesReportRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> DailySalesReportRepository for SurrealDailySalesReportRepository<C> {
    async fn upsert(&self, report: DailySalesReport) -> CanopyResult<DailySalesReport> {
        let result = self
            .db
            .query(
                "UPSERT type::record('daily_sales_report', $id) SET \
                 tenant_id = $tenant_id, \
                 dispensary_id = $dispensary_id, \
                 date = $date, \
                 total_orders = $total_orders, \
                 total_revenue = $total_revenue, \
                 total_tax = $total_tax, \
                 total_excise_tax = $total_excise_tax, \
                 items_sold = $items_sold, \
                 unique_customers = $unique_customers, \
                 cancelled_orders = $cancelled_orders, \
                 refunded_amount = $refunded_amount, \
                 average_order_value = $average_order_value, \
                 generated_at = time::now()",
            )
            .bind(("id", report_record_id(report.tenant_id, report.dispensary_id, report.date)))
            .bind(("tenant_id", report.tenant_id.to_string()))
            .bind(("dispensary_id", report.dispensary_id.to_string()))
            .bind(("date", report.date.format(DATE_FORMAT).to_string()))
            .bind(("total_orders", report.total_orders))
            .bind(("total_revenue", report.total_revenue))
            .bind(("total_tax", report.total_tax))
            .bind(("total_excise_tax", report.total_excise_tax))
            .bind(("items_sold", report.items_sold))
            .bind(("unique_customers", report.unique_customers))
            .bind(("cancelled_orders", report.cancelled_orders))
            .bind(("refunded_amount", report.refunded_amount))
            .bind(("average_order_value", report.average_order_value))
            .await
            .map_err(DbError::from)?;

        result
            .check()
            .map_err(|e| DbError::from_statement("daily_sales_report", e))?;

        Ok(report)
    }

    async fn get(
        &self,
        tenant_id: Uuid,
        dispensary_id: Uuid,
        date: NaiveDate,
    ) -> CanopyResult<DailySalesReport> {
        let id = report_record_id(tenant_id, dispensary_id, date);

        let mut result = self
            .db
            .query(
                "SELECT * FROM type::record('daily_sales_report', $id) \
                 WHERE tenant_id = $tenant_id",
            )
            .bind(("id", id.clone()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<DailySalesReportRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "daily_sales_report".into(),
            id,
        })?;

        Ok(row.try_into_report()?)
    }

    async fn list(
        &self,
        tenant_id: Uuid,
        dispensary_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> CanopyResult<Vec<DailySalesReport>> {
        // ISO dates compare correctly as strings.
        let mut result = self
            .db
            .query(
                "SELECT * FROM daily_sales_report \
                 WHERE tenant_id = $tenant_id AND dispensary_id = $dispensary_id \
                 AND date >= $from AND date <= $to \
                 ORDER BY date ASC",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("dispensary_id", dispensary_id.to_string()))
            .bind(("from", from.format(DATE_FORMAT).to_string()))
            .bind(("to", to.format(DATE_FORMAT).to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<DailySalesReportRow> = result.take(0).map_err(DbError::from)?;
        let reports = rows
            .into_iter()
            .map(DailySalesReportRow::try_into_report)
            .collect::<Result<Vec<_>, DbError>>()?;
        Ok(reports)
    }
}
