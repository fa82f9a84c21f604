//! Integration tests for the compliance log repository using in-memory SurrealDB.

use canopy_core::error::CanopyError;
use canopy_core::models::compliance::{AppendComplianceLogEntry, ComplianceEventType};
use canopy_core::repository::{ComplianceLogFilter, ComplianceLogRepository, Pagination};
use canopy_db::repository::SurrealComplianceLogRepository;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::json;
use surrealdb::Surreal;
use surrealdb::engine::local::Mem;
use uuid::Uuid;

async fn setup() -> Surreal<surrealdb::engine::local::Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    canopy_db::run_migrations(&db).await.unwrap();
    db
}

fn entry(
    tenant_id: Uuid,
    dispensary_id: Uuid,
    sequence: u64,
    event_type: ComplianceEventType,
    created_at: DateTime<Utc>,
) -> AppendComplianceLogEntry {
    AppendComplianceLogEntry {
        id: Uuid::new_v4(),
        tenant_id,
        dispensary_id,
        sequence,
        event_type,
        details: json!({ "sequence": sequence, "note": "hello, \"world\"" }),
        actor_id: None,
        order_id: None,
        created_at,
        previous_hash: (sequence > 0).then(|| format!("hash-{}", sequence - 1)),
        hash: format!("hash-{sequence}"),
    }
}

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 2, 10, 12, 0, 0).unwrap()
}

#[tokio::test]
async fn append_and_read_back_chain_tip() {
    let repo = SurrealComplianceLogRepository::new(setup().await);
    let tenant = Uuid::new_v4();
    let dispensary = Uuid::new_v4();

    assert!(repo.chain_tip(tenant, dispensary).await.unwrap().is_none());

    for seq in 0..3 {
        repo.append(entry(
            tenant,
            dispensary,
            seq,
            ComplianceEventType::Sale,
            base_time() + Duration::minutes(seq as i64),
        ))
        .await
        .unwrap();
    }

    let tip = repo.chain_tip(tenant, dispensary).await.unwrap().unwrap();
    assert_eq!(tip.sequence, 2);
    assert_eq!(tip.hash, "hash-2");
    assert_eq!(tip.previous_hash.as_deref(), Some("hash-1"));
    assert_eq!(tip.details["note"], "hello, \"world\"");
}

#[tokio::test]
async fn duplicate_sequence_is_a_conflict() {
    let repo = SurrealComplianceLogRepository::new(setup().await);
    let tenant = Uuid::new_v4();
    let dispensary = Uuid::new_v4();

    repo.append(entry(tenant, dispensary, 0, ComplianceEventType::Sale, base_time()))
        .await
        .unwrap();
    let err = repo
        .append(entry(tenant, dispensary, 0, ComplianceEventType::Return, base_time()))
        .await
        .unwrap_err();

    assert!(matches!(err, CanopyError::AlreadyExists { .. }));
}

#[tokio::test]
async fn list_chain_is_ascending_from_sequence() {
    let repo = SurrealComplianceLogRepository::new(setup().await);
    let tenant = Uuid::new_v4();
    let dispensary = Uuid::new_v4();

    for seq in 0..5 {
        repo.append(entry(
            tenant,
            dispensary,
            seq,
            ComplianceEventType::IdVerification,
            base_time(),
        ))
        .await
        .unwrap();
    }

    let page = repo.list_chain(tenant, dispensary, 2, 2).await.unwrap();
    let sequences: Vec<u64> = page.iter().map(|e| e.sequence).collect();
    assert_eq!(sequences, vec![2, 3]);
}

#[tokio::test]
async fn find_filters_by_half_open_range_and_type() {
    let repo = SurrealComplianceLogRepository::new(setup().await);
    let tenant = Uuid::new_v4();
    let dispensary = Uuid::new_v4();

    let types = [
        ComplianceEventType::Sale,
        ComplianceEventType::PurchaseLimitCheck,
        ComplianceEventType::Sale,
        ComplianceEventType::Sale,
    ];
    for (seq, event_type) in types.into_iter().enumerate() {
        repo.append(entry(
            tenant,
            dispensary,
            seq as u64,
            event_type,
            base_time() + Duration::hours(seq as i64),
        ))
        .await
        .unwrap();
    }

    let mut filter = ComplianceLogFilter::for_dispensary(dispensary);
    filter.from = Some(base_time());
    filter.to = Some(base_time() + Duration::hours(3));
    filter.event_type = Some(ComplianceEventType::Sale);

    let found = repo.find(tenant, filter).await.unwrap();
    let sequences: Vec<u64> = found.iter().map(|e| e.sequence).collect();
    // Newest first; the entry exactly at `to` is excluded.
    assert_eq!(sequences, vec![2, 0]);
}

#[tokio::test]
async fn entries_are_invisible_to_other_tenants() {
    let repo = SurrealComplianceLogRepository::new(setup().await);
    let tenant_a = Uuid::new_v4();
    let tenant_b = Uuid::new_v4();
    let dispensary = Uuid::new_v4();

    repo.append(entry(tenant_a, dispensary, 0, ComplianceEventType::Sale, base_time()))
        .await
        .unwrap();

    let found = repo
        .find(tenant_b, ComplianceLogFilter::for_dispensary(dispensary))
        .await
        .unwrap();
    assert!(found.is_empty());
    assert!(repo.chain_tip(tenant_b, dispensary).await.unwrap().is_none());
}

#[tokio::test]
async fn list_paginates_and_counts() {
    let repo = SurrealComplianceLogRepository::new(setup().await);
    let tenant = Uuid::new_v4();
    let dispensary = Uuid::new_v4();

    for seq in 0..7 {
        repo.append(entry(
            tenant,
            dispensary,
            seq,
            ComplianceEventType::InventoryAdjustment,
            base_time() + Duration::minutes(seq as i64),
        ))
        .await
        .unwrap();
    }

    let page = repo
        .list(
            tenant,
            ComplianceLogFilter::for_dispensary(dispensary),
            Pagination {
                offset: 5,
                limit: 5,
            },
        )
        .await
        .unwrap();

    assert_eq!(page.total, 7);
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.items[0].sequence, 1);
    assert_eq!(page.items[1].sequence, 0);
}
