//! Schema definitions and migration runner for SurrealDB.
//!
//! All table definitions use SCHEMAFULL mode. UUIDs are stored as
//! strings. Enums are stored as strings with ASSERT constraints.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;

use crate::error::DbError;

// -----------------------------------------------------------------------
// Migration tracking
// -----------------------------------------------------------------------

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, SurrealValue)]
struct MigrationRecord {
    version: u32,
    #[allow(dead_code)]
    name: String,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "compliance_core",
    sql: SCHEMA_V1,
}];

// -----------------------------------------------------------------------
// Schema v1
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Tenants (global scope, resolved by subdomain)
-- =======================================================================
DEFINE TABLE tenant SCHEMAFULL;
DEFINE FIELD name ON TABLE tenant TYPE string;
DEFINE FIELD subdomain ON TABLE tenant TYPE string \
    ASSERT string::len($value) > 0;
DEFINE FIELD jurisdiction ON TABLE tenant TYPE string;
DEFINE FIELD created_at ON TABLE tenant TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE tenant TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_tenant_subdomain ON TABLE tenant \
    COLUMNS subdomain UNIQUE;

-- =======================================================================
-- Compliance Log (tenant scope, append-only, hash-chained per dispensary)
-- =======================================================================
DEFINE TABLE compliance_log SCHEMAFULL
    PERMISSIONS
        FOR create FULL
        FOR select FULL
        FOR update NONE
        FOR delete NONE;
DEFINE FIELD tenant_id ON TABLE compliance_log TYPE string;
DEFINE FIELD dispensary_id ON TABLE compliance_log TYPE string;
DEFINE FIELD sequence ON TABLE compliance_log TYPE int;
DEFINE FIELD event_type ON TABLE compliance_log TYPE string \
    ASSERT $value IN ['SALE', 'RETURN', 'INVENTORY_ADJUSTMENT', \
    'INVENTORY_RECEIVED', 'INVENTORY_DESTROYED', 'PRODUCT_RECALL', \
    'ID_VERIFICATION', 'PURCHASE_LIMIT_CHECK'];
DEFINE FIELD details ON TABLE compliance_log TYPE string;
DEFINE FIELD actor_id ON TABLE compliance_log TYPE option<string>;
DEFINE FIELD order_id ON TABLE compliance_log TYPE option<string>;
DEFINE FIELD created_at ON TABLE compliance_log TYPE datetime;
DEFINE FIELD previous_hash ON TABLE compliance_log TYPE option<string>;
DEFINE FIELD hash ON TABLE compliance_log TYPE string;
DEFINE INDEX idx_compliance_chain ON TABLE compliance_log \
    COLUMNS tenant_id, dispensary_id, sequence UNIQUE;
DEFINE INDEX idx_compliance_time ON TABLE compliance_log \
    COLUMNS tenant_id, dispensary_id, created_at;

-- =======================================================================
-- Sales Orders (tenant scope, owned by the commerce collaborators)
-- =======================================================================
DEFINE TABLE sales_order SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE sales_order TYPE string;
DEFINE FIELD dispensary_id ON TABLE sales_order TYPE string;
DEFINE FIELD customer_id ON TABLE sales_order TYPE string;
DEFINE FIELD order_number ON TABLE sales_order TYPE string;
DEFINE FIELD status ON TABLE sales_order TYPE string \
    ASSERT $value IN ['PENDING', 'CONFIRMED', 'PREPARING', 'READY', \
    'COMPLETED', 'CANCELLED', 'REFUNDED'];
DEFINE FIELD items ON TABLE sales_order TYPE array;
DEFINE FIELD items.* ON TABLE sales_order TYPE object FLEXIBLE;
DEFINE FIELD subtotal ON TABLE sales_order TYPE float;
DEFINE FIELD tax ON TABLE sales_order TYPE float;
DEFINE FIELD excise_tax ON TABLE sales_order TYPE float;
DEFINE FIELD total ON TABLE sales_order TYPE float;
DEFINE FIELD created_at ON TABLE sales_order TYPE datetime;
DEFINE FIELD updated_at ON TABLE sales_order TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_order_dispensary_time ON TABLE sales_order \
    COLUMNS tenant_id, dispensary_id, created_at;
DEFINE INDEX idx_order_customer_time ON TABLE sales_order \
    COLUMNS tenant_id, dispensary_id, customer_id, created_at;
DEFINE INDEX idx_order_number ON TABLE sales_order \
    COLUMNS tenant_id, order_number UNIQUE;

-- =======================================================================
-- Daily Sales Reports (tenant scope, one row per dispensary and day)
-- =======================================================================
DEFINE TABLE daily_sales_report SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE daily_sales_report TYPE string;
DEFINE FIELD dispensary_id ON TABLE daily_sales_report TYPE string;
DEFINE FIELD date ON TABLE daily_sales_report TYPE string;
DEFINE FIELD total_orders ON TABLE daily_sales_report TYPE int;
DEFINE FIELD total_revenue ON TABLE daily_sales_report TYPE float;
DEFINE FIELD total_tax ON TABLE daily_sales_report TYPE float;
DEFINE FIELD total_excise_tax ON TABLE daily_sales_report TYPE float;
DEFINE FIELD items_sold ON TABLE daily_sales_report TYPE float;
DEFINE FIELD unique_customers ON TABLE daily_sales_report TYPE int;
DEFINE FIELD cancelled_orders ON TABLE daily_sales_report TYPE int;
DEFINE FIELD refunded_amount ON TABLE daily_sales_report TYPE float;
DEFINE FIELD average_order_value ON TABLE daily_sales_report TYPE float;
DEFINE FIELD generated_at ON TABLE daily_sales_report TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_report_dispensary_date ON TABLE daily_sales_report \
    COLUMNS tenant_id, dispensary_id, date UNIQUE;
";

// -----------------------------------------------------------------------
// Public API
// -----------------------------------------------------------------------

/// Run all pending migrations against the given SurrealDB client.
///
/// Creates a `_migration` tracking table on first run, then applies
/// each migration whose version exceeds the current maximum.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    let mut result = db
        .query("SELECT * FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let records: Vec<MigrationRecord> = result.take(0)?;
    let current_version = records.first().map(|m| m.version).unwrap_or(0);

    for migration in MIGRATIONS {
        if migration.version > current_version {
            info!(
                version = migration.version,
                name = migration.name,
                "Applying migration"
            );
            db.query(migration.sql).await?.check().map_err(|e| {
                DbError::Migration(format!(
                    "Migration v{} '{}' failed: {}",
                    migration.version, migration.name, e,
                ))
            })?;

            db.query(
                "CREATE _migration SET version = $version, \
                 name = $name",
            )
            .bind(("version", migration.version))
            .bind(("name", migration.name))
            .await?
            .check()
            .map_err(|e| {
                DbError::Migration(format!(
                    "Failed to record migration v{}: {}",
                    migration.version, e,
                ))
            })?;

            info!(
                version = migration.version,
                "Migration applied successfully"
            );
        }
    }

    Ok(())
}

/// Returns the raw schema DDL for version 1.
pub fn schema_v1() -> &'static str {
    SCHEMA_V1
}
