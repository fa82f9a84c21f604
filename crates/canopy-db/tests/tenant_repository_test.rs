//! Integration tests for the Tenant repository using in-memory SurrealDB.

use canopy_core::error::CanopyError;
use canopy_core::models::tenant::CreateTenant;
use canopy_core::repository::TenantRepository;
use canopy_db::repository::SurrealTenantRepository;
use surrealdb::Surreal;
use surrealdb::engine::local::Mem;

/// Helper: spin up in-memory DB and run migrations.
async fn setup() -> Surreal<surrealdb::engine::local::Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    canopy_db::run_migrations(&db).await.unwrap();
    db
}

fn tenant_input(name: &str, subdomain: &str) -> CreateTenant {
    CreateTenant {
        name: name.into(),
        subdomain: subdomain.into(),
        jurisdiction: "US-CO".into(),
    }
}

#[tokio::test]
async fn create_and_get_tenant() {
    let repo = SurrealTenantRepository::new(setup().await);

    let tenant = repo
        .create(tenant_input("Green Leaf", "greenleaf"))
        .await
        .unwrap();
    assert_eq!(tenant.name, "Green Leaf");
    assert_eq!(tenant.subdomain, "greenleaf");
    assert_eq!(tenant.jurisdiction, "US-CO");

    let fetched = repo.get_by_id(tenant.id).await.unwrap();
    assert_eq!(fetched.id, tenant.id);
    assert_eq!(fetched.subdomain, tenant.subdomain);
}

#[tokio::test]
async fn subdomain_lookup_is_case_insensitive() {
    let repo = SurrealTenantRepository::new(setup().await);

    let tenant = repo
        .create(tenant_input("High Desert", "HighDesert"))
        .await
        .unwrap();
    assert_eq!(tenant.subdomain, "highdesert");

    let fetched = repo.get_by_subdomain("HIGHDESERT").await.unwrap();
    assert_eq!(fetched.id, tenant.id);
}

#[tokio::test]
async fn unknown_subdomain_is_not_found() {
    let repo = SurrealTenantRepository::new(setup().await);

    let err = repo.get_by_subdomain("nobody").await.unwrap_err();
    assert!(matches!(err, CanopyError::NotFound { .. }));
}

#[tokio::test]
async fn duplicate_subdomain_is_rejected() {
    let repo = SurrealTenantRepository::new(setup().await);

    repo.create(tenant_input("First", "dup")).await.unwrap();
    let err = repo.create(tenant_input("Second", "dup")).await.unwrap_err();
    assert!(matches!(err, CanopyError::AlreadyExists { .. }));
}

#[tokio::test]
async fn rename_changes_only_the_name() {
    let repo = SurrealTenantRepository::new(setup().await);

    let tenant = repo.create(tenant_input("Before", "rename")).await.unwrap();
    let renamed = repo.rename(tenant.id, "After".into()).await.unwrap();

    assert_eq!(renamed.id, tenant.id);
    assert_eq!(renamed.name, "After");
    assert_eq!(renamed.subdomain, "rename");
    assert!(renamed.updated_at >= tenant.updated_at);
}
