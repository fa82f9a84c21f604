//! HTTP routes.
//!
//! Everything under `/v1` is tenant-scoped: the tenant middleware runs
//! first and each handler receives the resolved `TenantContext`
//! explicitly.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::middleware::from_fn_with_state;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{Extension, Json, Router};
use canopy_compliance::audit::{ChainVerification, LogPage, LogQuery};
use canopy_compliance::quota::{QuotaDecision, QuotaRequest};
use canopy_compliance::sales::PlaceOrder;
use canopy_core::context::TenantContext;
use canopy_core::error::CanopyError;
use canopy_core::models::compliance::{
    ComplianceEvent, ComplianceEventType, ComplianceLogEntry, IdVerificationDetails,
    InventoryAdjustmentDetails, InventoryMovementDetails, ProductRecallDetails,
};
use canopy_core::models::order::Order;
use canopy_core::models::report::{DailySalesReport, Granularity, ProductRevenue, RevenueBucket};
use canopy_core::models::tenant::Tenant;
use canopy_core::repository::TenantRepository;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;
use surrealdb::Connection;
use tracing::info;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;
use crate::tenancy::resolve_tenant;

type ApiResult<T> = Result<T, ApiError>;
type SharedState<C> = State<Arc<AppState<C>>>;

const DEFAULT_TOP_PRODUCTS: usize = 10;
const MAX_TOP_PRODUCTS: usize = 100;

/// Build the application router.
pub fn build_router<C: Connection>(state: Arc<AppState<C>>) -> Router {
    let tenant_scoped = Router::new()
        .route("/v1/tenant", patch(rename_tenant::<C>))
        .route("/v1/compliance/logs", get(query_logs::<C>))
        .route("/v1/compliance/export", get(export_logs::<C>))
        .route("/v1/compliance/verify", get(verify_chain::<C>))
        .route(
            "/v1/compliance/id-verifications",
            post(record_id_verification::<C>),
        )
        .route(
            "/v1/compliance/inventory-adjustments",
            post(record_inventory_adjustment::<C>),
        )
        .route(
            "/v1/compliance/inventory-movements",
            post(record_inventory_movement::<C>),
        )
        .route("/v1/compliance/recalls", post(record_recall::<C>))
        .route("/v1/quota/check", post(check_quota::<C>))
        .route("/v1/orders", post(place_order::<C>))
        .route("/v1/orders/:id/complete", post(complete_order::<C>))
        .route("/v1/orders/:id/refund", post(refund_order::<C>))
        .route(
            "/v1/reports/daily",
            post(generate_daily_report::<C>).get(daily_reports::<C>),
        )
        .route("/v1/reports/revenue", get(revenue::<C>))
        .route("/v1/reports/top-products", get(top_products::<C>))
        .route_layer(from_fn_with_state(state.clone(), resolve_tenant::<C>));

    Router::new()
        .route("/healthz", get(healthz))
        .merge(tenant_scoped)
        .with_state(state)
}

async fn healthz() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

fn parse_event_type(raw: Option<String>) -> ApiResult<Option<ComplianceEventType>> {
    Ok(raw
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.parse::<ComplianceEventType>())
        .transpose()?)
}

#[derive(Debug, Deserialize)]
struct RenameTenantBody {
    name: String,
}

/// Administrative rename of the tenant the request resolved to.
async fn rename_tenant<C: Connection>(
    State(state): SharedState<C>,
    Extension(ctx): Extension<TenantContext>,
    Json(body): Json<RenameTenantBody>,
) -> ApiResult<Json<Tenant>> {
    let name = body.name.trim();
    if name.is_empty() {
        return Err(CanopyError::Validation {
            message: "tenant name must not be empty".into(),
        }
        .into());
    }
    let tenant = state.tenants.rename(ctx.tenant_id(), name.to_owned()).await?;
    info!(tenant_id = %tenant.id, name = %tenant.name, "Tenant renamed");
    Ok(Json(tenant))
}

// ---------------------------------------------------------------------------
// Compliance log
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct LogsParams {
    dispensary_id: Uuid,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    event_type: Option<String>,
    actor_id: Option<Uuid>,
    page: Option<u64>,
    limit: Option<u64>,
}

async fn query_logs<C: Connection>(
    State(state): SharedState<C>,
    Extension(ctx): Extension<TenantContext>,
    Query(params): Query<LogsParams>,
) -> ApiResult<Json<LogPage>> {
    let query = LogQuery {
        dispensary_id: params.dispensary_id,
        start: params.start,
        end: params.end,
        event_type: parse_event_type(params.event_type)?,
        actor_id: params.actor_id,
        page: params.page,
        limit: params.limit,
    };
    Ok(Json(state.audit.query_logs(&ctx, query).await?))
}

#[derive(Debug, Deserialize)]
struct RangeParams {
    dispensary_id: Uuid,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

async fn export_logs<C: Connection>(
    State(state): SharedState<C>,
    Extension(ctx): Extension<TenantContext>,
    Query(params): Query<RangeParams>,
) -> ApiResult<Response> {
    let csv = state
        .audit
        .export_for_regulator(&ctx, params.dispensary_id, params.start, params.end)
        .await?;
    let filename = format!(
        "attachment; filename=\"compliance-{}-{}.csv\"",
        params.dispensary_id,
        params.start.format("%Y%m%d")
    );
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, filename),
        ],
        csv,
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
struct DispensaryParams {
    dispensary_id: Uuid,
}

async fn verify_chain<C: Connection>(
    State(state): SharedState<C>,
    Extension(ctx): Extension<TenantContext>,
    Query(params): Query<DispensaryParams>,
) -> ApiResult<Json<ChainVerification>> {
    Ok(Json(
        state.audit.verify_chain(&ctx, params.dispensary_id).await?,
    ))
}

#[derive(Debug, Deserialize)]
struct IdVerificationBody {
    dispensary_id: Uuid,
    customer_id: Uuid,
    verification_type: String,
    verified: bool,
    actor_id: Option<Uuid>,
}

async fn record_id_verification<C: Connection>(
    State(state): SharedState<C>,
    Extension(ctx): Extension<TenantContext>,
    Json(body): Json<IdVerificationBody>,
) -> ApiResult<(StatusCode, Json<ComplianceLogEntry>)> {
    let event = ComplianceEvent::IdVerification(IdVerificationDetails {
        customer_id: body.customer_id,
        verification_type: body.verification_type,
        verified: body.verified,
    });
    let entry = state
        .audit
        .record(&ctx, body.dispensary_id, event, body.actor_id, None)
        .await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

#[derive(Debug, Deserialize)]
struct InventoryAdjustmentBody {
    dispensary_id: Uuid,
    variant_id: Uuid,
    old_quantity: f64,
    new_quantity: f64,
    reason: String,
    actor_id: Option<Uuid>,
}

async fn record_inventory_adjustment<C: Connection>(
    State(state): SharedState<C>,
    Extension(ctx): Extension<TenantContext>,
    Json(body): Json<InventoryAdjustmentBody>,
) -> ApiResult<(StatusCode, Json<ComplianceLogEntry>)> {
    let event = ComplianceEvent::InventoryAdjustment(InventoryAdjustmentDetails {
        variant_id: body.variant_id,
        old_quantity: body.old_quantity,
        new_quantity: body.new_quantity,
        reason: body.reason,
    });
    let entry = state
        .audit
        .record(&ctx, body.dispensary_id, event, body.actor_id, None)
        .await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum MovementKind {
    Received,
    Destroyed,
}

#[derive(Debug, Deserialize)]
struct InventoryMovementBody {
    dispensary_id: Uuid,
    kind: MovementKind,
    variant_id: Uuid,
    quantity: f64,
    batch_number: String,
    reason: String,
    actor_id: Option<Uuid>,
}

async fn record_inventory_movement<C: Connection>(
    State(state): SharedState<C>,
    Extension(ctx): Extension<TenantContext>,
    Json(body): Json<InventoryMovementBody>,
) -> ApiResult<(StatusCode, Json<ComplianceLogEntry>)> {
    let details = InventoryMovementDetails {
        variant_id: body.variant_id,
        quantity: body.quantity,
        batch_number: body.batch_number,
        reason: body.reason,
    };
    let event = match body.kind {
        MovementKind::Received => ComplianceEvent::InventoryReceived(details),
        MovementKind::Destroyed => ComplianceEvent::InventoryDestroyed(details),
    };
    let entry = state
        .audit
        .record(&ctx, body.dispensary_id, event, body.actor_id, None)
        .await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

#[derive(Debug, Deserialize)]
struct RecallBody {
    dispensary_id: Uuid,
    product_id: Uuid,
    batch_numbers: Vec<String>,
    reason: String,
    actor_id: Option<Uuid>,
}

async fn record_recall<C: Connection>(
    State(state): SharedState<C>,
    Extension(ctx): Extension<TenantContext>,
    Json(body): Json<RecallBody>,
) -> ApiResult<(StatusCode, Json<ComplianceLogEntry>)> {
    if body.batch_numbers.is_empty() {
        return Err(CanopyError::Validation {
            message: "a recall names at least one batch".into(),
        }
        .into());
    }
    let event = ComplianceEvent::ProductRecall(ProductRecallDetails {
        product_id: body.product_id,
        batch_numbers: body.batch_numbers,
        reason: body.reason,
    });
    let entry = state
        .audit
        .record(&ctx, body.dispensary_id, event, body.actor_id, None)
        .await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

// ---------------------------------------------------------------------------
// Quota and orders
// ---------------------------------------------------------------------------

async fn check_quota<C: Connection>(
    State(state): SharedState<C>,
    Extension(ctx): Extension<TenantContext>,
    Json(request): Json<QuotaRequest>,
) -> ApiResult<Json<QuotaDecision>> {
    Ok(Json(state.quota.check(&ctx, &request).await?))
}

async fn place_order<C: Connection>(
    State(state): SharedState<C>,
    Extension(ctx): Extension<TenantContext>,
    Json(input): Json<PlaceOrder>,
) -> ApiResult<(StatusCode, Json<Order>)> {
    let order = state.sales.place_order(&ctx, input).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

#[derive(Debug, Deserialize)]
struct CompleteOrderBody {
    actor_id: Option<Uuid>,
}

async fn complete_order<C: Connection>(
    State(state): SharedState<C>,
    Extension(ctx): Extension<TenantContext>,
    Path(order_id): Path<Uuid>,
    body: Option<Json<CompleteOrderBody>>,
) -> ApiResult<Json<Order>> {
    let actor_id = body.and_then(|Json(body)| body.actor_id);
    Ok(Json(
        state
            .sales
            .complete_order(&ctx, order_id, actor_id)
            .await?,
    ))
}

#[derive(Debug, Deserialize)]
struct RefundOrderBody {
    reason: String,
    actor_id: Option<Uuid>,
}

async fn refund_order<C: Connection>(
    State(state): SharedState<C>,
    Extension(ctx): Extension<TenantContext>,
    Path(order_id): Path<Uuid>,
    Json(body): Json<RefundOrderBody>,
) -> ApiResult<Json<Order>> {
    Ok(Json(
        state
            .sales
            .refund_order(&ctx, order_id, body.reason, body.actor_id)
            .await?,
    ))
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct GenerateReportBody {
    dispensary_id: Uuid,
    date: NaiveDate,
}

async fn generate_daily_report<C: Connection>(
    State(state): SharedState<C>,
    Extension(ctx): Extension<TenantContext>,
    Json(body): Json<GenerateReportBody>,
) -> ApiResult<Json<DailySalesReport>> {
    Ok(Json(
        state
            .reports
            .generate_daily_report(&ctx, body.dispensary_id, body.date)
            .await?,
    ))
}

/// Either one stored day (`date`) or a stored range (`from` and `to`).
#[derive(Debug, Deserialize)]
struct DailyReportParams {
    dispensary_id: Uuid,
    date: Option<NaiveDate>,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
}

async fn daily_reports<C: Connection>(
    State(state): SharedState<C>,
    Extension(ctx): Extension<TenantContext>,
    Query(params): Query<DailyReportParams>,
) -> ApiResult<Response> {
    match (params.date, params.from, params.to) {
        (Some(date), None, None) => {
            let report = state
                .reports
                .get_report(&ctx, params.dispensary_id, date)
                .await?;
            Ok(Json(report).into_response())
        }
        (None, Some(from), Some(to)) => {
            let reports = state
                .reports
                .list_reports(&ctx, params.dispensary_id, from, to)
                .await?;
            Ok(Json(reports).into_response())
        }
        _ => Err(CanopyError::Validation {
            message: "pass either `date` or both `from` and `to`".into(),
        }
        .into()),
    }
}

#[derive(Debug, Deserialize)]
struct RevenueParams {
    dispensary_id: Uuid,
    from: NaiveDate,
    to: NaiveDate,
    granularity: Option<Granularity>,
}

async fn revenue<C: Connection>(
    State(state): SharedState<C>,
    Extension(ctx): Extension<TenantContext>,
    Query(params): Query<RevenueParams>,
) -> ApiResult<Json<Vec<RevenueBucket>>> {
    let granularity = params.granularity.unwrap_or(Granularity::Day);
    Ok(Json(
        state
            .reports
            .revenue_by_period(&ctx, params.dispensary_id, params.from, params.to, granularity)
            .await?,
    ))
}

#[derive(Debug, Deserialize)]
struct TopProductsParams {
    dispensary_id: Uuid,
    from: NaiveDate,
    to: NaiveDate,
    limit: Option<usize>,
}

async fn top_products<C: Connection>(
    State(state): SharedState<C>,
    Extension(ctx): Extension<TenantContext>,
    Query(params): Query<TopProductsParams>,
) -> ApiResult<Json<Vec<ProductRevenue>>> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_TOP_PRODUCTS)
        .clamp(1, MAX_TOP_PRODUCTS);
    Ok(Json(
        state
            .reports
            .top_products(&ctx, params.dispensary_id, params.from, params.to, limit)
            .await?,
    ))
}
