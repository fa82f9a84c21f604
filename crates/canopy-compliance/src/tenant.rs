//! Tenant resolution from the request host.

use canopy_core::context::TenantContext;
use canopy_core::error::{CanopyError, CanopyResult};
use canopy_core::repository::TenantRepository;
use tracing::{debug, warn};

use crate::error::ComplianceError;

/// Extract the tenant subdomain key from a `Host` header value.
///
/// The port and any trailing dot are ignored and matching is
/// case-insensitive. A host with fewer than two labels, or with an empty
/// label, names no tenant.
pub fn extract_subdomain(host: &str) -> Result<String, ComplianceError> {
    let unidentified = || ComplianceError::UnidentifiedHost(host.to_string());

    let trimmed = host.trim();
    if trimmed.starts_with('[') {
        return Err(unidentified());
    }
    let without_port = match trimmed.rsplit_once(':') {
        Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name,
        Some(_) => return Err(unidentified()),
        None => trimmed,
    };
    let name = without_port.to_ascii_lowercase();
    let name = name.strip_suffix('.').unwrap_or(&name);

    let labels: Vec<&str> = name.split('.').collect();
    if labels.len() < 2 || labels.iter().any(|l| l.is_empty()) {
        return Err(unidentified());
    }
    Ok(labels[0].to_string())
}

/// Resolves the owning tenant of a request.
pub struct TenantResolver<T: TenantRepository> {
    tenant_repo: T,
}

impl<T: TenantRepository> TenantResolver<T> {
    pub fn new(tenant_repo: T) -> Self {
        Self { tenant_repo }
    }

    /// Resolve a host name to a tenant context with a single lookup.
    pub async fn resolve(&self, host: &str) -> CanopyResult<TenantContext> {
        let subdomain = extract_subdomain(host).inspect_err(|_| {
            debug!(host, "Host carries no tenant subdomain");
        })?;

        let tenant = self
            .tenant_repo
            .get_by_subdomain(&subdomain)
            .await
            .map_err(|e| match e {
                CanopyError::NotFound { .. } => {
                    warn!(subdomain = %subdomain, "Request for unknown tenant");
                    CanopyError::TenantNotFound {
                        subdomain: subdomain.clone(),
                    }
                }
                other => other,
            })?;

        Ok(TenantContext::for_tenant(&tenant))
    }
}
