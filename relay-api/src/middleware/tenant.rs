//! Tenant filter.
//!
//! For every path that is not allow-listed, asks the [`TenantResolver`] for
//! the tenant exactly once and stores a [`TenantContext`] in the request
//! extensions. Allow-listed requests pass through without touching the
//! resolver.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use relay_core::TenantContext;
use std::sync::Arc;

use crate::error::ApiError;
use crate::path_pattern::PathAllowList;
use crate::tenant::{default_tenant_allow_list, TenantResolver};

#[derive(Clone)]
pub struct TenantFilterState {
    resolver: Arc<dyn TenantResolver>,
    allow_list: Arc<PathAllowList>,
}

impl TenantFilterState {
    /// Filter with the default actuator and API-doc allow-list.
    pub fn new(resolver: Arc<dyn TenantResolver>) -> Self {
        Self::with_allow_list(resolver, default_tenant_allow_list())
    }

    pub fn with_allow_list(resolver: Arc<dyn TenantResolver>, allow_list: PathAllowList) -> Self {
        Self {
            resolver,
            allow_list: Arc::new(allow_list),
        }
    }
}

impl std::fmt::Debug for TenantFilterState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantFilterState")
            .field("resolver", &"<TenantResolver>")
            .field("allow_list", &self.allow_list)
            .finish()
    }
}

pub async fn tenant_filter_middleware(
    State(state): State<TenantFilterState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if state.allow_list.is_allowed(request.uri().path()) {
        return Ok(next.run(request).await);
    }

    let tenant_id = state.resolver.resolve(&request)?;

    tracing::Span::current().record("tenant_id", tracing::field::display(tenant_id));
    tracing::debug!(tenant_id = %tenant_id, "Tenant resolved");

    request
        .extensions_mut()
        .insert(TenantContext::new(tenant_id));

    Ok(next.run(request).await)
}
