//! Integration tests for host-based tenant resolution.

use canopy_compliance::tenant::TenantResolver;
use canopy_compliance::{AuditLogWriter, ComplianceConfig};
use canopy_core::error::CanopyError;
use canopy_core::models::compliance::{ComplianceEvent, IdVerificationDetails};
use canopy_core::models::tenant::CreateTenant;
use canopy_core::repository::{ComplianceLogFilter, ComplianceLogRepository, TenantRepository};
use canopy_db::repository::{SurrealComplianceLogRepository, SurrealTenantRepository};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

async fn setup() -> Surreal<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    canopy_db::run_migrations(&db).await.unwrap();

    let tenants = SurrealTenantRepository::new(db.clone());
    for (name, subdomain) in [("Green Leaf", "greenleaf"), ("High Desert", "highdesert")] {
        tenants
            .create(CreateTenant {
                name: name.into(),
                subdomain: subdomain.into(),
                jurisdiction: "US-CO".into(),
            })
            .await
            .unwrap();
    }
    db
}

#[tokio::test]
async fn resolves_known_subdomain() {
    let resolver = TenantResolver::new(SurrealTenantRepository::new(setup().await));

    let ctx = resolver.resolve("GreenLeaf.canopy.app:443").await.unwrap();
    assert_eq!(ctx.subdomain(), "greenleaf");
    assert_eq!(ctx.jurisdiction(), "US-CO");
}

#[tokio::test]
async fn unknown_subdomain_is_tenant_not_found() {
    let resolver = TenantResolver::new(SurrealTenantRepository::new(setup().await));

    let err = resolver.resolve("nobody.canopy.app").await.unwrap_err();
    match err {
        CanopyError::TenantNotFound { subdomain } => assert_eq!(subdomain, "nobody"),
        other => panic!("expected TenantNotFound, got {other:?}"),
    }
}

#[tokio::test]
async fn bare_host_is_not_identified() {
    let resolver = TenantResolver::new(SurrealTenantRepository::new(setup().await));

    let err = resolver.resolve("localhost:8080").await.unwrap_err();
    assert!(matches!(err, CanopyError::TenantNotIdentified));
}

#[tokio::test]
async fn interleaved_requests_never_see_each_others_data() {
    let db = setup().await;
    let resolver = TenantResolver::new(SurrealTenantRepository::new(db.clone()));
    let log_repo = SurrealComplianceLogRepository::new(db.clone());
    let writer = AuditLogWriter::new(log_repo.clone(), &ComplianceConfig::default());

    // Both tenants happen to use the same dispensary id.
    let dispensary = Uuid::new_v4();
    let green = resolver.resolve("greenleaf.canopy.app").await.unwrap();
    let desert = resolver.resolve("highdesert.canopy.app").await.unwrap();
    assert_ne!(green.tenant_id(), desert.tenant_id());

    let verification = |customer_id| {
        ComplianceEvent::IdVerification(IdVerificationDetails {
            customer_id,
            verification_type: "drivers_license".into(),
            verified: true,
        })
    };
    let green_customer = Uuid::new_v4();
    let desert_customer = Uuid::new_v4();

    let (a, b) = tokio::join!(
        writer.record(&green, dispensary, verification(green_customer), None, None),
        writer.record(&desert, dispensary, verification(desert_customer), None, None),
    );
    a.unwrap();
    b.unwrap();
    writer
        .record(&green, dispensary, verification(green_customer), None, None)
        .await
        .unwrap();

    let green_logs = log_repo
        .find(green.tenant_id(), ComplianceLogFilter::for_dispensary(dispensary))
        .await
        .unwrap();
    let desert_logs = log_repo
        .find(desert.tenant_id(), ComplianceLogFilter::for_dispensary(dispensary))
        .await
        .unwrap();

    assert_eq!(green_logs.len(), 2);
    assert!(green_logs.iter().all(|e| e.tenant_id == green.tenant_id()));
    assert!(
        green_logs
            .iter()
            .all(|e| e.details["customerId"] == green_customer.to_string())
    );
    assert_eq!(desert_logs.len(), 1);
    assert_eq!(desert_logs[0].details["customerId"], desert_customer.to_string());

    // Each tenant's chain starts at zero independently.
    assert_eq!(desert_logs[0].sequence, 0);
    assert_eq!(desert_logs[0].previous_hash, None);
}
