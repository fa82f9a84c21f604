//! Integration tests for the Order repository using in-memory SurrealDB.

use canopy_core::error::CanopyError;
use canopy_core::models::order::{CreateOrder, OrderItem, OrderStatus, ProductCategory};
use canopy_core::repository::OrderRepository;
use canopy_db::repository::SurrealOrderRepository;
use chrono::{DateTime, Duration, TimeZone, Utc};
use surrealdb::Surreal;
use surrealdb::engine::local::Mem;
use uuid::Uuid;

async fn setup() -> Surreal<surrealdb::engine::local::Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    canopy_db::run_migrations(&db).await.unwrap();
    db
}

fn flower(grams: f64) -> OrderItem {
    OrderItem {
        product_id: Uuid::new_v4(),
        product_name: "Blue Dream".into(),
        variant_name: "eighth".into(),
        category: ProductCategory::Flower,
        quantity: grams,
        weight: Some(grams),
        unit_price: 10.0,
        batch_number: "B-100".into(),
        license_number: "LIC-1".into(),
    }
}

fn order_input(
    tenant_id: Uuid,
    dispensary_id: Uuid,
    customer_id: Uuid,
    number: &str,
    created_at: DateTime<Utc>,
) -> CreateOrder {
    CreateOrder {
        tenant_id,
        dispensary_id,
        customer_id,
        order_number: number.into(),
        items: vec![flower(3.5)],
        subtotal: 35.0,
        tax: 2.8,
        excise_tax: 5.25,
        total: 43.05,
        status: None,
        created_at: Some(created_at),
    }
}

fn day() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 2, 10, 0, 0, 0).unwrap()
}

#[tokio::test]
async fn create_defaults_to_pending_and_keeps_items() {
    let repo = SurrealOrderRepository::new(setup().await);
    let tenant = Uuid::new_v4();

    let order = repo
        .create(order_input(
            tenant,
            Uuid::new_v4(),
            Uuid::new_v4(),
            "ORD-1",
            day(),
        ))
        .await
        .unwrap();

    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.items.len(), 1);
    assert_eq!(order.items[0].category, ProductCategory::Flower);
    assert_eq!(order.items[0].weight, Some(3.5));
    assert_eq!(order.created_at, day());

    let fetched = repo.get_by_id(tenant, order.id).await.unwrap();
    assert_eq!(fetched.order_number, "ORD-1");
}

#[tokio::test]
async fn orders_are_invisible_to_other_tenants() {
    let repo = SurrealOrderRepository::new(setup().await);
    let tenant = Uuid::new_v4();

    let order = repo
        .create(order_input(
            tenant,
            Uuid::new_v4(),
            Uuid::new_v4(),
            "ORD-1",
            day(),
        ))
        .await
        .unwrap();

    let err = repo.get_by_id(Uuid::new_v4(), order.id).await.unwrap_err();
    assert!(matches!(err, CanopyError::NotFound { .. }));

    let err = repo
        .update_status(Uuid::new_v4(), order.id, OrderStatus::Cancelled)
        .await
        .unwrap_err();
    assert!(matches!(err, CanopyError::NotFound { .. }));

    let unchanged = repo.get_by_id(tenant, order.id).await.unwrap();
    assert_eq!(unchanged.status, OrderStatus::Pending);
}

#[tokio::test]
async fn update_status_persists() {
    let repo = SurrealOrderRepository::new(setup().await);
    let tenant = Uuid::new_v4();

    let order = repo
        .create(order_input(
            tenant,
            Uuid::new_v4(),
            Uuid::new_v4(),
            "ORD-1",
            day(),
        ))
        .await
        .unwrap();

    let updated = repo
        .update_status(tenant, order.id, OrderStatus::Completed)
        .await
        .unwrap();
    assert_eq!(updated.status, OrderStatus::Completed);
}

#[tokio::test]
async fn list_by_customer_respects_window() {
    let repo = SurrealOrderRepository::new(setup().await);
    let tenant = Uuid::new_v4();
    let dispensary = Uuid::new_v4();
    let customer = Uuid::new_v4();

    let times = [
        day() - Duration::minutes(1),
        day(),
        day() + Duration::hours(23),
        day() + Duration::days(1),
    ];
    for (i, at) in times.into_iter().enumerate() {
        repo.create(order_input(
            tenant,
            dispensary,
            customer,
            &format!("ORD-{i}"),
            at,
        ))
        .await
        .unwrap();
    }
    // Same window, other customer.
    repo.create(order_input(
        tenant,
        dispensary,
        Uuid::new_v4(),
        "ORD-X",
        day() + Duration::hours(1),
    ))
    .await
    .unwrap();

    let orders = repo
        .list_by_customer(tenant, dispensary, customer, day(), day() + Duration::days(1))
        .await
        .unwrap();
    let numbers: Vec<&str> = orders.iter().map(|o| o.order_number.as_str()).collect();
    assert_eq!(numbers, vec!["ORD-1", "ORD-2"]);

    let all = repo
        .list_by_dispensary(tenant, dispensary, day(), day() + Duration::days(1))
        .await
        .unwrap();
    assert_eq!(all.len(), 3);
}

#[tokio::test]
async fn dispensaries_with_orders_groups_pairs() {
    let repo = SurrealOrderRepository::new(setup().await);
    let tenant = Uuid::new_v4();
    let first = Uuid::new_v4();
    let second = Uuid::new_v4();

    for (i, dispensary) in [first, first, second].into_iter().enumerate() {
        repo.create(order_input(
            tenant,
            dispensary,
            Uuid::new_v4(),
            &format!("ORD-{i}"),
            day() + Duration::hours(1),
        ))
        .await
        .unwrap();
    }

    let mut pairs = repo
        .dispensaries_with_orders(day(), day() + Duration::days(1))
        .await
        .unwrap();
    pairs.sort();
    let mut expected = vec![(tenant, first), (tenant, second)];
    expected.sort();
    assert_eq!(pairs, expected);
}
