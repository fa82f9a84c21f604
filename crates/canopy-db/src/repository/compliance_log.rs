//! SurrealDB implementation of [`ComplianceLogRepository`].
//!
//! The details payload is stored as the exact JSON text that was hashed,
//! so chain verification recomputes hashes over byte-identical input.

use canopy_core::error::CanopyResult;
use canopy_core::models::compliance::{
    AppendComplianceLogEntry, ComplianceEventType, ComplianceLogEntry,
};
use canopy_core::repository::{
    ComplianceLogFilter, ComplianceLogRepository, PaginatedResult, Pagination,
};
use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{CountRow, parse_optional_uuid, parse_uuid};
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct ComplianceLogRowWithId {
    record_id: String,
    tenant_id: String,
    dispensary_id: String,
    sequence: u64,
    event_type: String,
    details: String,
    actor_id: Option<String>,
    order_id: Option<String>,
    created_at: DateTime<Utc>,
    previous_hash: Option<String>,
    hash: String,
}

impl ComplianceLogRowWithId {
    fn try_into_entry(self) -> Result<ComplianceLogEntry, DbError> {
        let event_type = self
            .event_type
            .parse::<ComplianceEventType>()
            .map_err(|e| DbError::Decode(e.to_string()))?;
        let details = serde_json::from_str(&self.details)
            .map_err(|e| DbError::Decode(format!("invalid details JSON: {e}")))?;
        Ok(ComplianceLogEntry {
            id: parse_uuid(&self.record_id, "compliance_log")?,
            tenant_id: parse_uuid(&self.tenant_id, "tenant")?,
            dispensary_id: parse_uuid(&self.dispensary_id, "dispensary")?,
            sequence: self.sequence,
            event_type,
            details,
            actor_id: parse_optional_uuid(self.actor_id, "actor")?,
            order_id: parse_optional_uuid(self.order_id, "order")?,
            created_at: self.created_at,
            previous_hash: self.previous_hash,
            hash: self.hash,
        })
    }
}

fn rows_into_entries(rows: Vec<ComplianceLogRowWithId>) -> Result<Vec<ComplianceLogEntry>, DbError> {
    rows.into_iter()
        .map(ComplianceLogRowWithId::try_into_entry)
        .collect()
}

/// Build the WHERE clause for a filter. Bindings are applied separately
/// by `bind_filter!` so the two must stay in step.
fn filter_clause(filter: &ComplianceLogFilter) -> String {
    let mut conditions = vec!["tenant_id = $tenant_id", "dispensary_id = $dispensary_id"];
    if filter.from.is_some() {
        conditions.push("created_at >= $from");
    }
    if filter.to.is_some() {
        conditions.push("created_at < $to");
    }
    if filter.event_type.is_some() {
        conditions.push("event_type = $event_type");
    }
    if filter.actor_id.is_some() {
        conditions.push("actor_id = $actor_id");
    }
    conditions.join(" AND ")
}

/// Apply the bindings referenced by [`filter_clause`] to a query builder.
macro_rules! bind_filter {
    ($builder:expr, $tenant_id:expr, $filter:expr) => {{
        let filter: &ComplianceLogFilter = $filter;
        let mut builder = $builder
            .bind(("tenant_id", $tenant_id.to_string()))
            .bind(("dispensary_id", filter.dispensary_id.to_string()));
        if let Some(from) = filter.from {
            builder = builder.bind(("from", from));
        }
        if let Some(to) = filter.to {
            builder = builder.bind(("to", to));
        }
        if let Some(event_type) = filter.event_type {
            builder = builder.bind(("event_type", event_type.as_str()));
        }
        if let Some(actor_id) = filter.actor_id {
            builder = builder.bind(("actor_id", actor_id.to_string()));
        }
        builder
    }};
}

/// SurrealDB implementation of the append-only compliance log.
pub struct SurrealComplianceLogRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> Clone for SurrealComplianceLogRepository<C> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
        }
    }
}

impl<C: Connection> SurrealComplianceLogRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> ComplianceLogRepository for SurrealComplianceLogRepository<C> {
    async fn append(&self, entry: AppendComplianceLogEntry) -> CanopyResult<ComplianceLogEntry> {
        let details = serde_json::to_string(&entry.details)
            .map_err(|e| DbError::Decode(format!("details not serializable: {e}")))?;

        let result = self
            .db
            .query(
                "CREATE type::record('compliance_log', $id) SET \
                 tenant_id = $tenant_id, \
                 dispensary_id = $dispensary_id, \
                 sequence = $sequence, \
                 event_type = $event_type, \
                 details = $details, \
                 actor_id = $actor_id, \
                 order_id = $order_id, \
                 created_at = $created_at, \
                 previous_hash = $previous_hash, \
                 hash = $hash",
            )
            .bind(("id", entry.id.to_string()))
            .bind(("tenant_id", entry.tenant_id.to_string()))
            .bind(("dispensary_id", entry.dispensary_id.to_string()))
            .bind(("sequence", entry.sequence))
            .bind(("event_type", entry.event_type.as_str()))
            .bind(("details", details))
            .bind(("actor_id", entry.actor_id.map(|id| id.to_string())))
            .bind(("order_id", entry.order_id.map(|id| id.to_string())))
            .bind(("created_at", entry.created_at))
            .bind(("previous_hash", entry.previous_hash.clone()))
            .bind(("hash", entry.hash.clone()))
            .await
            .map_err(DbError::from)?;

        result
            .check()
            .map_err(|e| DbError::from_statement("compliance_log", e))?;

        Ok(entry.into())
    }

    async fn chain_tip(
        &self,
        tenant_id: Uuid,
        dispensary_id: Uuid,
    ) -> CanopyResult<Option<ComplianceLogEntry>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM compliance_log \
                 WHERE tenant_id = $tenant_id AND dispensary_id = $dispensary_id \
                 ORDER BY sequence DESC LIMIT 1",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("dispensary_id", dispensary_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ComplianceLogRowWithId> = result.take(0).map_err(DbError::from)?;
        Ok(rows_into_entries(rows)?.into_iter().next())
    }

    async fn list_chain(
        &self,
        tenant_id: Uuid,
        dispensary_id: Uuid,
        from_sequence: u64,
        limit: u64,
    ) -> CanopyResult<Vec<ComplianceLogEntry>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM compliance_log \
                 WHERE tenant_id = $tenant_id AND dispensary_id = $dispensary_id \
                 AND sequence >= $from_sequence \
                 ORDER BY sequence ASC LIMIT $limit",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("dispensary_id", dispensary_id.to_string()))
            .bind(("from_sequence", from_sequence))
            .bind(("limit", limit))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ComplianceLogRowWithId> = result.take(0).map_err(DbError::from)?;
        Ok(rows_into_entries(rows)?)
    }

    async fn find(
        &self,
        tenant_id: Uuid,
        filter: ComplianceLogFilter,
    ) -> CanopyResult<Vec<ComplianceLogEntry>> {
        let query = format!(
            "SELECT meta::id(id) AS record_id, * FROM compliance_log \
             WHERE {} ORDER BY created_at DESC, sequence DESC",
            filter_clause(&filter)
        );

        let mut result = bind_filter!(self.db.query(query), tenant_id, &filter)
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ComplianceLogRowWithId> = result.take(0).map_err(DbError::from)?;
        Ok(rows_into_entries(rows)?)
    }

    async fn list(
        &self,
        tenant_id: Uuid,
        filter: ComplianceLogFilter,
        pagination: Pagination,
    ) -> CanopyResult<PaginatedResult<ComplianceLogEntry>> {
        let where_clause = filter_clause(&filter);

        let count_query =
            format!("SELECT count() AS total FROM compliance_log WHERE {where_clause} GROUP ALL");
        let mut count_result = bind_filter!(self.db.query(count_query), tenant_id, &filter)
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let page_query = format!(
            "SELECT meta::id(id) AS record_id, * FROM compliance_log \
             WHERE {where_clause} \
             ORDER BY created_at DESC, sequence DESC \
             LIMIT $limit START $offset"
        );
        let mut result = bind_filter!(self.db.query(page_query), tenant_id, &filter)
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ComplianceLogRowWithId> = result.take(0).map_err(DbError::from)?;

        Ok(PaginatedResult {
            items: rows_into_entries(rows)?,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}
