//! Tenant filter behavior on the assembled router.
//!
//! The resolver runs exactly once for every path that is not allow-listed,
//! including paths no route matches, and never for allow-listed paths.

use std::sync::Arc;

use axum::http::{Method, StatusCode};
use relay_api::{
    AccessTokenTenantResolver, ErrorCode, PathAllowList, TenantFilterState,
    TENANT_FILTER_ALLOW_LIST,
};
use relay_core::{Authority, TenantId};
use relay_test_utils::assertions::assert_error_body;
use relay_test_utils::fixtures::{self, bearer, bearer_with_authorities};
use relay_test_utils::RecordingTenantResolver;
use tower::ServiceExt;

#[path = "support/app.rs"]
mod test_app_support;
use test_app_support::{
    body_bytes, test_app_with_tenant_filter, test_app_with_tenant_resolver, RequestSpec,
};

fn recording_app() -> (test_app_support::TestApp, Arc<RecordingTenantResolver>) {
    let resolver = Arc::new(RecordingTenantResolver::new(TenantId::new(42)));
    let app = test_app_with_tenant_resolver(resolver.clone());
    (app, resolver)
}

#[tokio::test]
async fn test_liveness_skips_resolver() {
    let (app, resolver) = recording_app();
    let response = app
        .router
        .clone()
        .oneshot(RequestSpec::new(Method::GET, "/actuator/health/liveness").build())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(resolver.call_count(), 0);
}

#[tokio::test]
async fn test_allow_listed_paths_skip_resolver() {
    let (app, resolver) = recording_app();
    for path in [
        "/actuator/health",
        "/actuator/health/readiness",
        "/actuator/prometheus",
    ] {
        let response = app
            .router
            .clone()
            .oneshot(RequestSpec::new(Method::GET, path).build())
            .await
            .unwrap();
        assert!(response.status().is_success(), "{}", path);
    }
    assert_eq!(resolver.call_count(), 0);
    assert!(TENANT_FILTER_ALLOW_LIST.contains(&"/actuator/health/**"));
}

#[tokio::test]
async fn test_unmatched_path_resolves_tenant_once() {
    let (app, resolver) = recording_app();
    let response = app
        .router
        .clone()
        .oneshot(RequestSpec::new(Method::GET, "/messages/1").build())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(resolver.resolved_uris(), vec!["/messages/1".to_string()]);
}

#[tokio::test]
async fn test_message_request_resolves_tenant_once() {
    let (app, resolver) = recording_app();
    let config = fixtures::auth_config();
    let response = app
        .router
        .clone()
        .oneshot(
            RequestSpec::new(Method::GET, "/messages?rcGroupId=GROUPxyz12345abcd")
                .bearer(bearer_with_authorities(&config, &[Authority::ConsultantDefault]))
                .build(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(resolver.call_count(), 1);
    assert_eq!(app.facade.call_count(), 1);
}

#[tokio::test]
async fn test_access_token_without_tenant_is_rejected() {
    let app = test_app_with_tenant_resolver(Arc::new(AccessTokenTenantResolver));
    let config = fixtures::auth_config();
    let response = app
        .router
        .clone()
        .oneshot(
            RequestSpec::new(Method::POST, "/messages/new")
                .bearer(bearer_with_authorities(&config, &[Authority::UserDefault]))
                .json(serde_json::json!({ "message": "Hallo" }))
                .build(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_error_body(&body_bytes(response).await, ErrorCode::TenantNotResolved);
    assert_eq!(app.facade.call_count(), 0);
}

#[tokio::test]
async fn test_access_token_tenant_claim_is_accepted() {
    let app = test_app_with_tenant_resolver(Arc::new(AccessTokenTenantResolver));
    let config = fixtures::auth_config();
    let claims = relay_api::Claims::new("user-1", 3600, &*config.clock)
        .with_authorities([Authority::UserDefault])
        .with_tenant(TenantId::new(7));

    let response = app
        .router
        .clone()
        .oneshot(
            RequestSpec::new(Method::POST, "/messages/new")
                .bearer(bearer(&config, &claims))
                .json(serde_json::json!({ "message": "Hallo" }))
                .build(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(app.facade.call_count(), 1);
}

#[tokio::test]
async fn test_technical_principal_needs_no_tenant_claim() {
    let app = test_app_with_tenant_resolver(Arc::new(AccessTokenTenantResolver));
    let config = fixtures::auth_config();
    let response = app
        .router
        .clone()
        .oneshot(
            RequestSpec::new(Method::POST, "/messages/key")
                .bearer(bearer_with_authorities(&config, &[Authority::TechnicalDefault]))
                .json(serde_json::json!({ "masterKey": "rotated" }))
                .build(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(app.encryption.key_updates(), vec!["rotated".to_string()]);
}

#[tokio::test]
#[cfg(feature = "openapi")]
async fn test_custom_allow_list_replaces_default() {
    let resolver = Arc::new(RecordingTenantResolver::new(TenantId::new(9)));
    let app = test_app_with_tenant_filter(TenantFilterState::with_allow_list(
        resolver.clone(),
        PathAllowList::new(["/actuator/**"]),
    ));

    for path in ["/actuator/health/liveness", "/actuator/prometheus", "/openapi.json"] {
        let response = app
            .router
            .clone()
            .oneshot(RequestSpec::new(Method::GET, path).build())
            .await
            .unwrap();
        assert!(response.status().is_success(), "{}", path);
    }

    assert_eq!(resolver.resolved_uris(), vec!["/openapi.json".to_string()]);
}
