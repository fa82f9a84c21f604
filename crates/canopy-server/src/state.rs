//! Shared application state.

use std::sync::Arc;

use canopy_compliance::audit::AuditLogWriter;
use canopy_compliance::config::ComplianceConfig;
use canopy_compliance::quota::PurchaseQuotaChecker;
use canopy_compliance::reports::DailySalesAggregator;
use canopy_compliance::sales::SalesService;
use canopy_compliance::tenant::TenantResolver;
use canopy_db::repository::{
    SurrealComplianceLogRepository, SurrealDailySalesReportRepository, SurrealOrderRepository,
    SurrealTenantRepository,
};
use surrealdb::{Connection, Surreal};

pub type Orders<C> = SurrealOrderRepository<C>;
pub type Logs<C> = SurrealComplianceLogRepository<C>;

/// Services shared by every request. Nothing here is tenant-specific;
/// the tenant travels with each request as a `TenantContext`.
pub struct AppState<C: Connection> {
    pub resolver: TenantResolver<SurrealTenantRepository<C>>,
    pub tenants: SurrealTenantRepository<C>,
    pub orders: Orders<C>,
    pub audit: AuditLogWriter<Logs<C>>,
    pub quota: PurchaseQuotaChecker<Orders<C>, Logs<C>>,
    pub reports: DailySalesAggregator<Orders<C>, SurrealDailySalesReportRepository<C>>,
    pub sales: SalesService<Orders<C>, Logs<C>>,
}

impl<C: Connection> AppState<C> {
    /// Wire every service to one database handle. All writers share a
    /// single audit writer so chain appends are serialized process-wide.
    pub fn new(db: Surreal<C>, config: ComplianceConfig) -> Arc<Self> {
        let config = Arc::new(config);
        let tenants = SurrealTenantRepository::new(db.clone());
        let orders = SurrealOrderRepository::new(db.clone());
        let logs = SurrealComplianceLogRepository::new(db.clone());

        let audit = AuditLogWriter::new(logs, &config);
        let quota = PurchaseQuotaChecker::new(orders.clone(), audit.clone(), Arc::clone(&config));
        let reports = DailySalesAggregator::new(
            orders.clone(),
            SurrealDailySalesReportRepository::new(db),
            Arc::clone(&config),
        );
        let sales = SalesService::new(orders.clone(), audit.clone(), quota.clone());

        Arc::new(Self {
            resolver: TenantResolver::new(tenants.clone()),
            tenants,
            orders,
            audit,
            quota,
            reports,
            sales,
        })
    }
}
