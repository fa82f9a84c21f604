//! Canopy Compliance: tenant resolution, the hash-chained audit log,
//! purchase quotas, sales reporting and order orchestration.
//!
//! Every service is generic over the repository traits in `canopy-core`
//! and takes the request's [`TenantContext`](canopy_core::TenantContext)
//! explicitly.

pub mod audit;
pub mod config;
pub mod day;
pub mod error;
pub mod export;
pub mod hashing;
pub mod locks;
pub mod quota;
pub mod reports;
pub mod sales;
pub mod tenant;

pub use audit::{AuditLogWriter, ChainVerification, LogPage, LogQuery};
pub use config::{ComplianceConfig, QuotaStatusPolicy};
pub use error::ComplianceError;
pub use quota::{PurchaseQuotaChecker, QuotaDecision, QuotaRequest, QuotaReservation};
pub use reports::DailySalesAggregator;
pub use sales::{PlaceOrder, SalesService};
pub use tenant::TenantResolver;
