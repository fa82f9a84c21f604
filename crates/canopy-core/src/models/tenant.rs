//! Tenant domain model.
//!
//! A tenant is one dispensary operator. Every order, compliance event and
//! report row is scoped to exactly one tenant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A dispensary operator with an isolated data scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub id: Uuid,
    /// Human-readable name. The only field that may change after creation.
    pub name: String,
    /// Leading host label that routes requests to this tenant
    /// (e.g. `greenleaf` for `greenleaf.canopy.shop`).
    pub subdomain: String,
    /// Regulatory jurisdiction code used to select purchase limits
    /// (e.g. `US-CO`).
    pub jurisdiction: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields required to create a new tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTenant {
    pub name: String,
    pub subdomain: String,
    pub jurisdiction: String,
}
