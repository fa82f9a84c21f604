//! The scheduled report job across tenants.

use std::time::Duration;

use canopy_compliance::config::ComplianceConfig;
use canopy_core::context::TenantContext;
use canopy_core::models::order::{CreateOrder, OrderItem, OrderStatus, ProductCategory};
use canopy_core::models::tenant::{CreateTenant, Tenant};
use canopy_core::repository::{OrderRepository, TenantRepository};
use canopy_server::jobs::{ReportRunSummary, run_daily_reports};
use canopy_server::{AppState, ReportJobConfig};
use chrono::{NaiveDate, Offset, TimeZone, Utc};
use surrealdb::Surreal;
use surrealdb::engine::local::Mem;
use uuid::Uuid;

async fn tenant<C: surrealdb::Connection>(state: &AppState<C>, subdomain: &str) -> Tenant {
    state
        .tenants
        .create(CreateTenant {
            name: subdomain.to_uppercase(),
            subdomain: subdomain.into(),
            jurisdiction: "US-CO".into(),
        })
        .await
        .unwrap()
}

fn order(tenant: &Tenant, dispensary_id: Uuid, total: f64, hour: u32) -> CreateOrder {
    CreateOrder {
        tenant_id: tenant.id,
        dispensary_id,
        customer_id: Uuid::new_v4(),
        order_number: format!("ORD-{}", Uuid::new_v4().simple()),
        items: vec![OrderItem {
            product_id: Uuid::new_v4(),
            product_name: "Gummies".into(),
            variant_name: "10 pack".into(),
            category: ProductCategory::Edible,
            quantity: 1.0,
            weight: None,
            unit_price: total,
            batch_number: "B-7".into(),
            license_number: "LIC-7".into(),
        }],
        subtotal: total,
        tax: 0.0,
        excise_tax: 0.0,
        total,
        status: Some(OrderStatus::Completed),
        created_at: Some(Utc.with_ymd_and_hms(2026, 2, 10, hour, 0, 0).unwrap()),
    }
}

fn quick_retries() -> ReportJobConfig {
    ReportJobConfig {
        retry_backoff: Duration::from_millis(1),
        ..ReportJobConfig::default()
    }
}

#[tokio::test]
async fn reports_every_dispensary_with_orders_in_every_tenant() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    canopy_db::run_migrations(&db).await.unwrap();
    let state = AppState::new(db, ComplianceConfig::default());

    let green = tenant(&state, "green").await;
    let blue = tenant(&state, "blue").await;
    let green_store = Uuid::new_v4();
    let blue_store = Uuid::new_v4();

    state.orders.create(order(&green, green_store, 30.0, 9)).await.unwrap();
    state.orders.create(order(&green, green_store, 20.0, 15)).await.unwrap();
    state.orders.create(order(&blue, blue_store, 12.5, 11)).await.unwrap();
    // Next day; must not be picked up.
    let mut late = order(&blue, blue_store, 99.0, 0);
    late.created_at = Some(Utc.with_ymd_and_hms(2026, 2, 11, 0, 30, 0).unwrap());
    state.orders.create(late).await.unwrap();

    let date = NaiveDate::from_ymd_opt(2026, 2, 10).unwrap();
    let summary = run_daily_reports(state.clone(), date, Utc.fix(), &quick_retries()).await;
    assert_eq!(
        summary,
        ReportRunSummary {
            generated: 2,
            failed: 0
        }
    );

    let green_report = state
        .reports
        .get_report(&TenantContext::for_tenant(&green), green_store, date)
        .await
        .unwrap();
    assert_eq!(green_report.total_orders, 2);
    assert_eq!(green_report.total_revenue, 50.0);

    let blue_report = state
        .reports
        .get_report(&TenantContext::for_tenant(&blue), blue_store, date)
        .await
        .unwrap();
    assert_eq!(blue_report.total_orders, 1);
    assert_eq!(blue_report.total_revenue, 12.5);
}

#[tokio::test]
async fn a_day_without_orders_generates_nothing() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    canopy_db::run_migrations(&db).await.unwrap();
    let state = AppState::new(db, ComplianceConfig::default());

    let date = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
    let summary = run_daily_reports(state, date, Utc.fix(), &quick_retries()).await;
    assert_eq!(summary, ReportRunSummary::default());
}
