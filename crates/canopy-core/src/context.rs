//! Request-scoped tenant context.
//!
//! One `TenantContext` is built per inbound request by the tenant resolver
//! and handed explicitly to every service call made while serving that
//! request. It is never stored in global or thread-local state.

use uuid::Uuid;

use crate::models::tenant::Tenant;

#[derive(Debug, Clone)]
pub struct TenantContext {
    tenant_id: Uuid,
    subdomain: String,
    jurisdiction: String,
}

impl TenantContext {
    /// Build the context for a freshly resolved tenant.
    pub fn for_tenant(tenant: &Tenant) -> Self {
        Self {
            tenant_id: tenant.id,
            subdomain: tenant.subdomain.clone(),
            jurisdiction: tenant.jurisdiction.clone(),
        }
    }

    pub fn tenant_id(&self) -> Uuid {
        self.tenant_id
    }

    pub fn subdomain(&self) -> &str {
        &self.subdomain
    }

    pub fn jurisdiction(&self) -> &str {
        &self.jurisdiction
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn context_carries_tenant_identity() {
        let tenant = Tenant {
            id: Uuid::new_v4(),
            name: "Green Leaf".into(),
            subdomain: "greenleaf".into(),
            jurisdiction: "US-CO".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let ctx = TenantContext::for_tenant(&tenant);
        assert_eq!(ctx.tenant_id(), tenant.id);
        assert_eq!(ctx.subdomain(), "greenleaf");
        assert_eq!(ctx.jurisdiction(), "US-CO");
    }
}
