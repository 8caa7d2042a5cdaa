//! Tenant resolution.
//!
//! [`TenantResolver`] turns an incoming request into a [`TenantId`]. The
//! tenant filter middleware calls it for every request whose path is not on
//! [`TENANT_FILTER_ALLOW_LIST`].

use axum::extract::Request;
use relay_core::TenantId;

use crate::auth::AuthContext;
use crate::error::{ApiError, ApiResult};
use crate::path_pattern::PathAllowList;

/// Paths served without tenant resolution.
pub const TENANT_FILTER_ALLOW_LIST: &[&str] = &[
    "/actuator/health",
    "/actuator/health/**",
    "/actuator/prometheus",
    "/openapi.json",
];

pub fn default_tenant_allow_list() -> PathAllowList {
    PathAllowList::new(TENANT_FILTER_ALLOW_LIST.iter().copied())
}

/// Resolves the tenant a request belongs to.
pub trait TenantResolver: Send + Sync {
    fn resolve(&self, request: &Request) -> ApiResult<TenantId>;
}

/// Resolves the tenant from the authenticated access token.
///
/// Technical principals always land in [`TenantId::TECHNICAL`]; everyone else
/// needs a `tenantId` claim.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessTokenTenantResolver;

impl TenantResolver for AccessTokenTenantResolver {
    fn resolve(&self, request: &Request) -> ApiResult<TenantId> {
        let auth = request
            .extensions()
            .get::<AuthContext>()
            .ok_or_else(|| ApiError::unauthorized("Tenant resolution requires authentication"))?;

        if auth.is_technical() {
            return Ok(TenantId::TECHNICAL);
        }

        auth.tenant_id.ok_or_else(|| {
            ApiError::tenant_not_resolved(format!(
                "Access token of user {} carries no tenantId claim",
                auth.user_id
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use axum::body::Body;
    use relay_core::Authority;
    use std::collections::BTreeSet;

    fn request_with(auth: Option<AuthContext>) -> Request {
        let mut request = Request::builder()
            .uri("/messages")
            .body(Body::empty())
            .unwrap();
        if let Some(auth) = auth {
            request.extensions_mut().insert(auth);
        }
        request
    }

    #[test]
    fn test_allow_list_covers_actuator_and_docs() {
        let list = default_tenant_allow_list();
        assert!(list.is_allowed("/actuator/health"));
        assert!(list.is_allowed("/actuator/health/liveness"));
        assert!(list.is_allowed("/actuator/health/readiness"));
        assert!(list.is_allowed("/actuator/prometheus"));
        assert!(list.is_allowed("/openapi.json"));
        assert!(!list.is_allowed("/messages"));
        assert!(!list.is_allowed("/messages/1"));
        assert!(!list.is_allowed("/actuator/env"));
    }

    #[test]
    fn test_unauthenticated_request_is_rejected() {
        let err = AccessTokenTenantResolver
            .resolve(&request_with(None))
            .err();
        assert_eq!(err.map(|e| e.code), Some(ErrorCode::Unauthorized));
    }

    #[test]
    fn test_technical_principal_gets_technical_tenant() {
        let auth = AuthContext::new("svc", BTreeSet::from([Authority::TechnicalDefault]))
            .with_tenant(TenantId::new(12));
        let tenant = AccessTokenTenantResolver
            .resolve(&request_with(Some(auth)))
            .unwrap();
        assert!(tenant.is_technical());
    }

    #[test]
    fn test_tenant_claim_is_used() {
        let auth = AuthContext::new("u", BTreeSet::from([Authority::UserDefault]))
            .with_tenant(TenantId::new(12));
        let tenant = AccessTokenTenantResolver
            .resolve(&request_with(Some(auth)))
            .unwrap();
        assert_eq!(tenant, TenantId::new(12));
    }

    #[test]
    fn test_missing_claim_is_forbidden() {
        let auth = AuthContext::new("u", BTreeSet::from([Authority::UserDefault]));
        let err = AccessTokenTenantResolver
            .resolve(&request_with(Some(auth)))
            .err();
        assert_eq!(err.map(|e| e.code), Some(ErrorCode::TenantNotResolved));
    }
}
