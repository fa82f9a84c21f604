//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async. Tenant-scoped repositories
//! require a `tenant_id` parameter and must filter every read by it.

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::error::CanopyResult;
use crate::models::{
    compliance::{AppendComplianceLogEntry, ComplianceEventType, ComplianceLogEntry},
    order::{CreateOrder, Order, OrderStatus},
    report::DailySalesReport,
    tenant::{CreateTenant, Tenant},
};

/// Pagination parameters for list queries.
#[derive(Debug, Clone)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

/// A paginated result set.
#[derive(Debug, Clone)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

// ---------------------------------------------------------------------------
// Tenants (global scope)
// ---------------------------------------------------------------------------

pub trait TenantRepository: Send + Sync {
    fn create(&self, input: CreateTenant) -> impl Future<Output = CanopyResult<Tenant>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = CanopyResult<Tenant>> + Send;
    fn get_by_subdomain(
        &self,
        subdomain: &str,
    ) -> impl Future<Output = CanopyResult<Tenant>> + Send;
    /// Administrative rename; the only mutation a tenant supports.
    fn rename(&self, id: Uuid, name: String) -> impl Future<Output = CanopyResult<Tenant>> + Send;
}

// ---------------------------------------------------------------------------
// Compliance log (append-only, tenant-scoped)
// ---------------------------------------------------------------------------

/// Query filters for compliance log entries. Time bounds are half-open:
/// `from <= created_at < to`.
#[derive(Debug, Clone)]
pub struct ComplianceLogFilter {
    pub dispensary_id: Uuid,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub event_type: Option<ComplianceEventType>,
    pub actor_id: Option<Uuid>,
}

impl ComplianceLogFilter {
    pub fn for_dispensary(dispensary_id: Uuid) -> Self {
        Self {
            dispensary_id,
            from: None,
            to: None,
            event_type: None,
            actor_id: None,
        }
    }
}

pub trait ComplianceLogRepository: Send + Sync {
    /// Append a sealed entry. No update or delete operations exist.
    ///
    /// Fails with `AlreadyExists` when another writer already holds the
    /// entry's sequence number in the same chain.
    fn append(
        &self,
        entry: AppendComplianceLogEntry,
    ) -> impl Future<Output = CanopyResult<ComplianceLogEntry>> + Send;

    /// The most recent entry of a dispensary chain, if any.
    fn chain_tip(
        &self,
        tenant_id: Uuid,
        dispensary_id: Uuid,
    ) -> impl Future<Output = CanopyResult<Option<ComplianceLogEntry>>> + Send;

    /// Chain entries with `sequence >= from_sequence`, oldest first.
    fn list_chain(
        &self,
        tenant_id: Uuid,
        dispensary_id: Uuid,
        from_sequence: u64,
        limit: u64,
    ) -> impl Future<Output = CanopyResult<Vec<ComplianceLogEntry>>> + Send;

    /// All matching entries, newest first.
    fn find(
        &self,
        tenant_id: Uuid,
        filter: ComplianceLogFilter,
    ) -> impl Future<Output = CanopyResult<Vec<ComplianceLogEntry>>> + Send;

    /// One page of matching entries, newest first.
    fn list(
        &self,
        tenant_id: Uuid,
        filter: ComplianceLogFilter,
        pagination: Pagination,
    ) -> impl Future<Output = CanopyResult<PaginatedResult<ComplianceLogEntry>>> + Send;
}

// ---------------------------------------------------------------------------
// Orders (collaborator, tenant-scoped)
// ---------------------------------------------------------------------------

pub trait OrderRepository: Send + Sync {
    fn create(&self, input: CreateOrder) -> impl Future<Output = CanopyResult<Order>> + Send;
    fn get_by_id(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = CanopyResult<Order>> + Send;
    fn update_status(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        status: OrderStatus,
    ) -> impl Future<Output = CanopyResult<Order>> + Send;

    /// Orders of a dispensary created in `[from, to)`, oldest first,
    /// line items included.
    fn list_by_dispensary(
        &self,
        tenant_id: Uuid,
        dispensary_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> impl Future<Output = CanopyResult<Vec<Order>>> + Send;

    /// Orders of one customer at one dispensary created in `[from, to)`.
    fn list_by_customer(
        &self,
        tenant_id: Uuid,
        dispensary_id: Uuid,
        customer_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> impl Future<Output = CanopyResult<Vec<Order>>> + Send;

    /// Distinct `(tenant_id, dispensary_id)` pairs with at least one order
    /// created in `[from, to)`. Used by the scheduled report job.
    fn dispensaries_with_orders(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> impl Future<Output = CanopyResult<Vec<(Uuid, Uuid)>>> + Send;
}

// ---------------------------------------------------------------------------
// Daily sales reports (tenant-scoped)
// ---------------------------------------------------------------------------

pub trait DailySalesReportRepository: Send + Sync {
    /// Create or replace the row keyed by `(dispensary_id, date)`.
    fn upsert(
        &self,
        report: DailySalesReport,
    ) -> impl Future<Output = CanopyResult<DailySalesReport>> + Send;
    fn get(
        &self,
        tenant_id: Uuid,
        dispensary_id: Uuid,
        date: NaiveDate,
    ) -> impl Future<Output = CanopyResult<DailySalesReport>> + Send;
    /// Stored reports with `from <= date <= to`, oldest first.
    fn list(
        &self,
        tenant_id: Uuid,
        dispensary_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> impl Future<Output = CanopyResult<Vec<DailySalesReport>>> + Send;
}
