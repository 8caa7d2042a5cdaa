//! Authority gate.
//!
//! Applied with `route_layer` so the matched route template is known. Looks
//! the template and method up in [`ENDPOINT_RULES`](crate::authorization::ENDPOINT_RULES).

use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};

use super::auth::{extract_auth_context, AuthMiddlewareError};
use crate::authorization::authorize;

/// 401 without a principal, 403 without a matching authority or rule.
pub async fn authority_middleware(
    request: Request,
    next: Next,
) -> Result<Response, AuthMiddlewareError> {
    let auth = extract_auth_context(&request)?;

    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str())
        .unwrap_or_else(|| request.uri().path());

    if let Err(err) = authorize(auth, request.method(), path) {
        tracing::info!(
            user_id = %auth.user_id,
            method = %request.method(),
            path,
            "Authority check failed"
        );
        return Err(err.into());
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthContext;
    use axum::{
        body::Body,
        http::{Method, StatusCode},
        routing::{get, post},
        Extension, Router,
    };
    use relay_core::Authority;
    use std::collections::BTreeSet;
    use tower::ServiceExt;

    fn app(auth: Option<AuthContext>) -> Router {
        let router = Router::new()
            .route("/messages", get(|| async { "stream" }))
            .route("/messages/key", post(|| async { "key" }))
            .route("/messages/unlisted", get(|| async { "unlisted" }))
            .route_layer(axum::middleware::from_fn(authority_middleware));

        match auth {
            Some(auth) => router.layer(Extension(auth)),
            None => router,
        }
    }

    fn ctx(authorities: &[Authority]) -> AuthContext {
        AuthContext::new("u", authorities.iter().copied().collect::<BTreeSet<_>>())
    }

    async fn status(app: Router, method: Method, uri: &str) -> Result<StatusCode, String> {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .map_err(|e| e.to_string())?;
        let response = app
            .oneshot(request)
            .await
            .map_err(|e| format!("Request failed: {:?}", e))?;
        Ok(response.status())
    }

    #[tokio::test]
    async fn test_anonymous_is_unauthorized() -> Result<(), String> {
        assert_eq!(
            status(app(None), Method::GET, "/messages?rcGroupId=g").await?,
            StatusCode::UNAUTHORIZED
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_matched_path_ignores_query() -> Result<(), String> {
        let app = app(Some(ctx(&[Authority::UserDefault])));
        assert_eq!(
            status(app, Method::GET, "/messages?rcGroupId=g").await?,
            StatusCode::OK
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_authority_is_forbidden() -> Result<(), String> {
        let app = app(Some(ctx(&[Authority::UserDefault])));
        assert_eq!(
            status(app, Method::POST, "/messages/key").await?,
            StatusCode::FORBIDDEN
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_route_without_rule_is_forbidden() -> Result<(), String> {
        let app = app(Some(ctx(&Authority::ALL)));
        assert_eq!(
            status(app, Method::GET, "/messages/unlisted").await?,
            StatusCode::FORBIDDEN
        );
        Ok(())
    }
}
