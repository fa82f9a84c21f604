//! SurrealDB implementation of [`OrderRepository`].
//!
//! Line items are embedded in the order record, so every read returns
//! orders with their items already loaded.

use canopy_core::error::CanopyResult;
use canopy_core::models::order::{CreateOrder, Order, OrderItem, OrderStatus};
use canopy_core::repository::OrderRepository;
use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::parse_uuid;
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct OrderRowWithId {
    record_id: String,
    tenant_id: String,
    dispensary_id: String,
    customer_id: String,
    order_number: String,
    status: String,
    items: serde_json::Value,
    subtotal: f64,
    tax: f64,
    excise_tax: f64,
    total: f64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRowWithId {
    fn try_into_order(self) -> Result<Order, DbError> {
        let status = self
            .status
            .parse::<OrderStatus>()
            .map_err(|e| DbError::Decode(e.to_string()))?;
        let items: Vec<OrderItem> = serde_json::from_value(self.items)
            .map_err(|e| DbError::Decode(format!("invalid order items: {e}")))?;
        Ok(Order {
            id: parse_uuid(&self.record_id, "order")?,
            tenant_id: parse_uuid(&self.tenant_id, "tenant")?,
            dispensary_id: parse_uuid(&self.dispensary_id, "dispensary")?,
            customer_id: parse_uuid(&self.customer_id, "customer")?,
            order_number: self.order_number,
            status,
            items,
            subtotal: self.subtotal,
            tax: self.tax,
            excise_tax: self.excise_tax,
            total: self.total,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, SurrealValue)]
struct DispensaryPairRow {
    tenant_id: String,
    dispensary_id: String,
}

fn rows_into_orders(rows: Vec<OrderRowWithId>) -> Result<Vec<Order>, DbError> {
    rows.into_iter().map(OrderRowWithId::try_into_order).collect()
}

/// Projection that returns the record id alongside every stored field.
const ORDER_PROJECTION: &str = "meta::id(id) AS record_id, *";

/// SurrealDB implementation of the Order repository.
pub struct SurrealOrderRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> Clone for SurrealOrderRepository<C> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
        }
    }
}

impl<C: Connection> SurrealOrderRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> OrderRepository for SurrealOrderRepository<C> {
    async fn create(&self, input: CreateOrder) -> CanopyResult<Order> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();
        let items = serde_json::to_value(&input.items)
            .map_err(|e| DbError::Decode(format!("order items not serializable: {e}")))?;
        let status = input.status.unwrap_or(OrderStatus::Pending);
        let created_at = input.created_at.unwrap_or_else(Utc::now);

        let result = self
            .db
            .query(
                "CREATE type::record('sales_order', $id) SET \
                 tenant_id = $tenant_id, \
                 dispensary_id = $dispensary_id, \
                 customer_id = $customer_id, \
                 order_number = $order_number, \
                 status = $status, \
                 items = $items, \
                 subtotal = $subtotal, \
                 tax = $tax, \
                 excise_tax = $excise_tax, \
                 total = $total, \
                 created_at = $created_at",
            )
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", input.tenant_id.to_string()))
            .bind(("dispensary_id", input.dispensary_id.to_string()))
            .bind(("customer_id", input.customer_id.to_string()))
            .bind(("order_number", input.order_number))
            .bind(("status", status.as_str()))
            .bind(("items", items))
            .bind(("subtotal", input.subtotal))
            .bind(("tax", input.tax))
            .bind(("excise_tax", input.excise_tax))
            .bind(("total", input.total))
            .bind(("created_at", created_at))
            .await
            .map_err(DbError::from)?;

        result
            .check()
            .map_err(|e| DbError::from_statement("sales_order", e))?;

        self.get_by_id(input.tenant_id, id).await
    }

    async fn get_by_id(&self, tenant_id: Uuid, id: Uuid) -> CanopyResult<Order> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query(format!(
                "SELECT {ORDER_PROJECTION} FROM type::record('sales_order', $id) \
                 WHERE tenant_id = $tenant_id"
            ))
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<OrderRowWithId> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "order".into(),
            id: id_str,
        })?;

        Ok(row.try_into_order()?)
    }

    async fn update_status(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        status: OrderStatus,
    ) -> CanopyResult<Order> {
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "UPDATE type::record('sales_order', $id) \
                 SET status = $status, updated_at = time::now() \
                 WHERE tenant_id = $tenant_id",
            )
            .bind(("id", id_str.clone()))
            .bind(("status", status.as_str()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;
        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement("sales_order", e))?;

        let updated: Vec<surrealdb_types::Value> = result.take(0).map_err(DbError::from)?;
        if updated.is_empty() {
            return Err(DbError::NotFound {
                entity: "order".into(),
                id: id_str,
            }
            .into());
        }

        self.get_by_id(tenant_id, id).await
    }

    async fn list_by_dispensary(
        &self,
        tenant_id: Uuid,
        dispensary_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> CanopyResult<Vec<Order>> {
        let mut result = self
            .db
            .query(format!(
                "SELECT {ORDER_PROJECTION} FROM sales_order \
                 WHERE tenant_id = $tenant_id AND dispensary_id = $dispensary_id \
                 AND created_at >= $from AND created_at < $to \
                 ORDER BY created_at ASC"
            ))
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("dispensary_id", dispensary_id.to_string()))
            .bind(("from", from))
            .bind(("to", to))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<OrderRowWithId> = result.take(0).map_err(DbError::from)?;
        Ok(rows_into_orders(rows)?)
    }

    async fn list_by_customer(
        &self,
        tenant_id: Uuid,
        dispensary_id: Uuid,
        customer_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> CanopyResult<Vec<Order>> {
        let mut result = self
            .db
            .query(format!(
                "SELECT {ORDER_PROJECTION} FROM sales_order \
                 WHERE tenant_id = $tenant_id AND dispensary_id = $dispensary_id \
                 AND customer_id = $customer_id \
                 AND created_at >= $from AND created_at < $to \
                 ORDER BY created_at ASC"
            ))
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("dispensary_id", dispensary_id.to_string()))
            .bind(("customer_id", customer_id.to_string()))
            .bind(("from", from))
            .bind(("to", to))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<OrderRowWithId> = result.take(0).map_err(DbError::from)?;
        Ok(rows_into_orders(rows)?)
    }

    async fn dispensaries_with_orders(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> CanopyResult<Vec<(Uuid, Uuid)>> {
        let mut result = self
            .db
            .query(
                "SELECT tenant_id, dispensary_id FROM sales_order \
                 WHERE created_at >= $from AND created_at < $to \
                 GROUP BY tenant_id, dispensary_id",
            )
            .bind(("from", from))
            .bind(("to", to))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<DispensaryPairRow> = result.take(0).map_err(DbError::from)?;
        let pairs = rows
            .into_iter()
            .map(|row| {
                Ok((
                    parse_uuid(&row.tenant_id, "tenant")?,
                    parse_uuid(&row.dispensary_id, "dispensary")?,
                ))
            })
            .collect::<Result<Vec<_>, DbError>>()?;
        Ok(pairs)
    }
}
