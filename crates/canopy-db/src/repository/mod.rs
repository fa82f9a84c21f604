//! SurrealDB repository implementations.

mod compliance_log;
mod daily_report;
mod order;
mod tenant;

pub use compliance_log::SurrealComplianceLogRepository;
pub use daily_report::SurrealDailySalesReportRepository;
pub use order::SurrealOrderRepository;
pub use tenant::SurrealTenantRepository;

use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

/// Row struct for count queries.
#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

fn parse_uuid(value: &str, what: &str) -> Result<Uuid, DbError> {
    Uuid::parse_str(value).map_err(|e| DbError::Decode(format!("invalid {what} UUID: {e}")))
}

fn parse_optional_uuid(value: Option<String>, what: &str) -> Result<Option<Uuid>, DbError> {
    value.as_deref().map(|v| parse_uuid(v, what)).transpose()
}
