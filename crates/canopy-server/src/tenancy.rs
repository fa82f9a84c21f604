//! Tenant middleware.
//!
//! Runs before every tenant-scoped handler: resolves the tenant from the
//! request host and stores the `TenantContext` in that request's
//! extensions, where handlers pick it up with `Extension<TenantContext>`.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;
use canopy_core::error::CanopyError;
use surrealdb::Connection;
use tracing::debug;

use crate::error::ApiError;
use crate::state::AppState;

/// The host a request was addressed to, from the `Host` header or, for
/// HTTP/2 requests, the URI authority.
fn request_host(request: &Request) -> Option<String> {
    request
        .headers()
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
        .or_else(|| request.uri().authority().map(|a| a.as_str().to_owned()))
}

pub async fn resolve_tenant<C: Connection>(
    State(state): State<Arc<AppState<C>>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let host = request_host(&request).ok_or(CanopyError::TenantNotIdentified)?;
    let ctx = state.resolver.resolve(&host).await?;

    debug!(
        tenant_id = %ctx.tenant_id(),
        subdomain = ctx.subdomain(),
        path = %request.uri().path(),
        "Tenant resolved"
    );
    request.extensions_mut().insert(ctx);
    Ok(next.run(request).await)
}
