//! Authentication middleware.
//!
//! Validates the bearer token when one is present and injects the resulting
//! [`AuthContext`] into request extensions. Requests without an
//! `Authorization` header pass through unauthenticated; endpoints that need a
//! principal reject them later in the authority gate.

use crate::auth::{authenticate, AuthConfig, AuthContext};
use crate::error::{ApiError, ApiResult};
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

// ============================================================================
// MIDDLEWARE STATE
// ============================================================================

/// Shared state for authentication middleware.
#[derive(Debug, Clone)]
pub struct AuthMiddlewareState {
    pub auth_config: Arc<AuthConfig>,
}

impl AuthMiddlewareState {
    pub fn new(auth_config: AuthConfig) -> Self {
        Self {
            auth_config: Arc::new(auth_config),
        }
    }
}

// ============================================================================
// MIDDLEWARE FUNCTION
// ============================================================================

/// Axum middleware for bearer authentication.
///
/// - No `Authorization` header: continue without an [`AuthContext`].
/// - Header present but invalid (bad scheme, signature, expiry): 401.
/// - Valid token: inject [`AuthContext`] and continue.
pub async fn auth_middleware(
    State(state): State<AuthMiddlewareState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthMiddlewareError> {
    let auth_header = match request.headers().get(AUTHORIZATION) {
        None => return Ok(next.run(request).await),
        Some(value) => value.to_str().map_err(|_| {
            AuthMiddlewareError(ApiError::invalid_token(
                "Authorization header is not valid ASCII",
            ))
        })?,
    };

    let auth_context =
        authenticate(&state.auth_config, Some(auth_header)).map_err(AuthMiddlewareError)?;

    tracing::debug!(
        user_id = %auth_context.user_id,
        authorities = ?auth_context.authorities,
        "Request authenticated"
    );

    request.extensions_mut().insert(auth_context);

    Ok(next.run(request).await)
}

// ============================================================================
// ERROR HANDLING
// ============================================================================

/// Error wrapper for middleware rejections.
#[derive(Debug)]
pub struct AuthMiddlewareError(pub ApiError);

impl IntoResponse for AuthMiddlewareError {
    fn into_response(self) -> Response {
        let api_error = self.0;
        tracing::debug!(code = %api_error.code, "Request rejected by security middleware");
        api_error.into_response()
    }
}

impl From<ApiError> for AuthMiddlewareError {
    fn from(err: ApiError) -> Self {
        Self(err)
    }
}

// ============================================================================
// TYPED EXTRACTOR
// ============================================================================

/// Typed extractor for the authenticated principal.
///
/// Rejects with 401 when the request carries no [`AuthContext`].
#[derive(Debug, Clone)]
pub struct AuthExtractor(pub AuthContext);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthExtractor
where
    S: Send + Sync,
{
    type Rejection = AuthMiddlewareError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .map(AuthExtractor)
            .ok_or_else(|| AuthMiddlewareError(ApiError::unauthorized("Authentication required")))
    }
}

impl std::ops::Deref for AuthExtractor {
    type Target = AuthContext;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Borrow the [`AuthContext`] injected by [`auth_middleware`].
pub fn extract_auth_context(request: &Request) -> ApiResult<&AuthContext> {
    request
        .extensions()
        .get::<AuthContext>()
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{generate_jwt_token, AuthConfig};
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        middleware,
        routing::get,
        Router,
    };
    use relay_core::Authority;
    use tower::ServiceExt;

    fn test_auth_config() -> AuthConfig {
        AuthConfig::with_secret("test_secret")
    }

    fn test_app() -> Router {
        let auth_state = AuthMiddlewareState::new(test_auth_config());

        Router::new()
            .route(
                "/whoami",
                get(|auth: Option<AuthExtractor>| async move {
                    match auth {
                        Some(auth) => auth.user_id.clone(),
                        None => "anonymous".to_string(),
                    }
                }),
            )
            .route(
                "/authorities",
                get(|AuthExtractor(auth): AuthExtractor| async move {
                    auth.has_authority(Authority::ConsultantDefault).to_string()
                }),
            )
            .layer(middleware::from_fn_with_state(auth_state, auth_middleware))
    }

    async fn body_string(response: Response) -> Result<String, String> {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .map_err(|e| e.to_string())?;
        String::from_utf8(bytes.to_vec()).map_err(|e| e.to_string())
    }

    #[tokio::test]
    async fn test_missing_header_passes_through_anonymously() -> Result<(), String> {
        let request = Request::builder()
            .uri("/whoami")
            .body(Body::empty())
            .map_err(|e| e.to_string())?;

        let response = test_app()
            .oneshot(request)
            .await
            .map_err(|e| format!("Request failed: {:?}", e))?;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await?, "anonymous");
        Ok(())
    }

    #[tokio::test]
    async fn test_extractor_rejects_anonymous_requests() -> Result<(), String> {
        let request = Request::builder()
            .uri("/authorities")
            .body(Body::empty())
            .map_err(|e| e.to_string())?;

        let response = test_app()
            .oneshot(request)
            .await
            .map_err(|e| format!("Request failed: {:?}", e))?;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn test_valid_jwt_injects_context() -> Result<(), String> {
        let token = generate_jwt_token(
            &test_auth_config(),
            "consultant-7".to_string(),
            None,
            vec!["consultant".to_string()],
        )
        .map_err(|e| e.message)?;

        let request = Request::builder()
            .uri("/authorities")
            .header("authorization", format!("Bearer {}", token))
            .body(Body::empty())
            .map_err(|e| e.to_string())?;

        let response = test_app()
            .oneshot(request)
            .await
            .map_err(|e| format!("Request failed: {:?}", e))?;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await?, "true");
        Ok(())
    }

    #[tokio::test]
    async fn test_invalid_jwt_is_unauthorized() -> Result<(), String> {
        let request = Request::builder()
            .uri("/whoami")
            .header("authorization", "Bearer not.a.token")
            .body(Body::empty())
            .map_err(|e| e.to_string())?;

        let response = test_app()
            .oneshot(request)
            .await
            .map_err(|e| format!("Request failed: {:?}", e))?;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn test_malformed_auth_header_is_unauthorized() -> Result<(), String> {
        let request = Request::builder()
            .uri("/whoami")
            .header("authorization", "Token abc")
            .body(Body::empty())
            .map_err(|e| e.to_string())?;

        let response = test_app()
            .oneshot(request)
            .await
            .map_err(|e| format!("Request failed: {:?}", e))?;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }
}
