//! Audit log writer: the append-only, hash-chained compliance log.
//!
//! Each dispensary owns one chain. Appends to a chain are serialized
//! in-process by a keyed lock; across processes the unique
//! `(tenant, dispensary, sequence)` index rejects the loser of a race,
//! which then re-reads the tip and retries.

use std::sync::Arc;

use canopy_core::context::TenantContext;
use canopy_core::error::{CanopyError, CanopyResult};
use canopy_core::models::compliance::{
    AppendComplianceLogEntry, ComplianceEvent, ComplianceEventType, ComplianceLogEntry,
};
use canopy_core::repository::{ComplianceLogFilter, ComplianceLogRepository, Pagination};
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::ComplianceConfig;
use crate::error::ComplianceError;
use crate::export;
use crate::hashing::{self, HashInput};
use crate::locks::KeyedLocks;

/// Largest page a log query may request.
pub const MAX_PAGE_SIZE: u64 = 500;
const DEFAULT_PAGE_SIZE: u64 = 50;

/// Paginated compliance log query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogQuery {
    pub dispensary_id: Uuid,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub event_type: Option<ComplianceEventType>,
    pub actor_id: Option<Uuid>,
    /// 1-based page number.
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

/// One page of compliance log entries, newest first.
#[derive(Debug, Clone, Serialize)]
pub struct LogPage {
    pub items: Vec<ComplianceLogEntry>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

/// Outcome of recomputing a dispensary's chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainVerification {
    pub valid: bool,
    pub entries_checked: u64,
    /// Id of the first entry whose link or hash does not match.
    pub first_broken_at: Option<Uuid>,
}

fn audit_failure(err: impl ToString) -> CanopyError {
    CanopyError::AuditWriteFailure(err.to_string())
}

/// Verification only reads, so a digest failure there is internal rather
/// than a failed write.
fn verify_failure(err: ComplianceError) -> CanopyError {
    CanopyError::Internal(err.to_string())
}

fn check_range(start: DateTime<Utc>, end: DateTime<Utc>) -> CanopyResult<()> {
    if start >= end {
        return Err(ComplianceError::InvalidRange.into());
    }
    Ok(())
}

/// Writes and reads compliance events for the tenant in the given context.
///
/// Clones share the same lock set, so every writer built from one
/// instance serializes appends to a dispensary's chain.
#[derive(Clone)]
pub struct AuditLogWriter<L: ComplianceLogRepository> {
    log_repo: L,
    chain_locks: Arc<KeyedLocks<(Uuid, Uuid)>>,
    max_chain_retries: u32,
    verify_page_size: u64,
}

impl<L: ComplianceLogRepository> AuditLogWriter<L> {
    pub fn new(log_repo: L, config: &ComplianceConfig) -> Self {
        Self {
            log_repo,
            chain_locks: Arc::new(KeyedLocks::new()),
            max_chain_retries: config.max_chain_retries.max(1),
            verify_page_size: config.verify_page_size.max(1),
        }
    }

    /// Append one event to the dispensary's chain.
    ///
    /// Any failure to persist is reported as `AuditWriteFailure`; callers
    /// must treat the originating operation as failed.
    pub async fn record(
        &self,
        ctx: &TenantContext,
        dispensary_id: Uuid,
        event: ComplianceEvent,
        actor_id: Option<Uuid>,
        order_id: Option<Uuid>,
    ) -> CanopyResult<ComplianceLogEntry> {
        let tenant_id = ctx.tenant_id();
        let event_type = event.event_type();
        let details = event.details().map_err(audit_failure)?;

        let _guard = self.chain_locks.lock((tenant_id, dispensary_id)).await;

        for attempt in 1..=self.max_chain_retries {
            let tip = self
                .log_repo
                .chain_tip(tenant_id, dispensary_id)
                .await
                .map_err(|e| {
                    error!(%tenant_id, %dispensary_id, error = %e, "Failed to read chain tip");
                    audit_failure(e)
                })?;
            let (sequence, previous_hash) = match tip {
                Some(tip) => (tip.sequence + 1, Some(tip.hash)),
                None => (0, None),
            };

            let mut entry = AppendComplianceLogEntry {
                id: Uuid::new_v4(),
                tenant_id,
                dispensary_id,
                sequence,
                event_type,
                details: details.clone(),
                actor_id,
                order_id,
                // Stored and hashed at microsecond precision.
                created_at: Utc::now().trunc_subsecs(6),
                previous_hash,
                hash: String::new(),
            };
            entry.hash = hashing::entry_hash(&HashInput::from(&entry))?;

            match self.log_repo.append(entry).await {
                Ok(entry) => {
                    info!(
                        %tenant_id,
                        %dispensary_id,
                        event_type = %event_type,
                        sequence = entry.sequence,
                        "Compliance event recorded"
                    );
                    return Ok(entry);
                }
                Err(CanopyError::AlreadyExists { .. }) => {
                    warn!(
                        %tenant_id,
                        %dispensary_id,
                        sequence,
                        attempt,
                        "Chain sequence taken by another writer, retrying"
                    );
                }
                Err(e) => {
                    error!(
                        %tenant_id,
                        %dispensary_id,
                        event_type = %event_type,
                        error = %e,
                        "Failed to write compliance event"
                    );
                    return Err(audit_failure(e));
                }
            }
        }

        let err = ComplianceError::ChainConflict {
            dispensary_id,
            attempts: self.max_chain_retries,
        };
        error!(%tenant_id, %dispensary_id, error = %err, "Giving up on compliance event");
        Err(err.into())
    }

    /// Entries with `start <= created_at < end`, newest first.
    pub async fn find_logs(
        &self,
        ctx: &TenantContext,
        dispensary_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        event_type: Option<ComplianceEventType>,
    ) -> CanopyResult<Vec<ComplianceLogEntry>> {
        check_range(start, end)?;
        let filter = ComplianceLogFilter {
            from: Some(start),
            to: Some(end),
            event_type,
            ..ComplianceLogFilter::for_dispensary(dispensary_id)
        };
        self.log_repo.find(ctx.tenant_id(), filter).await
    }

    /// Paginated query with an optional range, type and actor filter.
    pub async fn query_logs(&self, ctx: &TenantContext, query: LogQuery) -> CanopyResult<LogPage> {
        if let (Some(start), Some(end)) = (query.start, query.end) {
            check_range(start, end)?;
        }
        let page = query.page.unwrap_or(1).max(1);
        let limit = query
            .limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);

        let filter = ComplianceLogFilter {
            dispensary_id: query.dispensary_id,
            from: query.start,
            to: query.end,
            event_type: query.event_type,
            actor_id: query.actor_id,
        };
        let result = self
            .log_repo
            .list(
                ctx.tenant_id(),
                filter,
                Pagination {
                    offset: (page - 1).saturating_mul(limit),
                    limit,
                },
            )
            .await?;

        Ok(LogPage {
            items: result.items,
            total: result.total,
            page,
            limit,
            total_pages: result.total.div_ceil(limit),
        })
    }

    /// Recompute the dispensary's chain oldest first and report the first
    /// entry whose sequence, back-link or hash does not match.
    pub async fn verify_chain(
        &self,
        ctx: &TenantContext,
        dispensary_id: Uuid,
    ) -> CanopyResult<ChainVerification> {
        let tenant_id = ctx.tenant_id();
        let mut expected_sequence = 0u64;
        let mut previous_hash: Option<String> = None;

        loop {
            let page = self
                .log_repo
                .list_chain(tenant_id, dispensary_id, expected_sequence, self.verify_page_size)
                .await?;
            let fetched = page.len() as u64;

            for entry in page {
                let intact = entry.sequence == expected_sequence
                    && entry.previous_hash == previous_hash
                    && hashing::verify_entry(&entry).map_err(verify_failure)?;
                if !intact {
                    warn!(
                        %tenant_id,
                        %dispensary_id,
                        entry_id = %entry.id,
                        sequence = entry.sequence,
                        "Compliance chain broken"
                    );
                    return Ok(ChainVerification {
                        valid: false,
                        entries_checked: expected_sequence + 1,
                        first_broken_at: Some(entry.id),
                    });
                }
                expected_sequence += 1;
                previous_hash = Some(entry.hash);
            }

            if fetched < self.verify_page_size {
                break;
            }
        }

        Ok(ChainVerification {
            valid: true,
            entries_checked: expected_sequence,
            first_broken_at: None,
        })
    }

    /// CSV export of `start <= created_at < end`, oldest first.
    pub async fn export_for_regulator(
        &self,
        ctx: &TenantContext,
        dispensary_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> CanopyResult<String> {
        let mut entries = self
            .find_logs(ctx, dispensary_id, start, end, None)
            .await?;
        entries.reverse();
        info!(
            tenant_id = %ctx.tenant_id(),
            %dispensary_id,
            rows = entries.len(),
            "Regulator export generated"
        );
        Ok(export::to_csv(&entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_failure_while_verifying_is_internal() {
        let err = verify_failure(ComplianceError::Hashing("bad float".into()));
        assert!(matches!(err, CanopyError::Internal(ref m) if m.contains("bad float")));
    }

    #[test]
    fn digest_failure_while_writing_is_an_audit_failure() {
        let err = audit_failure(ComplianceError::Hashing("bad float".into()));
        assert!(matches!(err, CanopyError::AuditWriteFailure(_)));
    }
}
