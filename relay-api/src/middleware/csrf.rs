//! Double-submit CSRF check.
//!
//! The client copies the value of the CSRF cookie into the CSRF header. A
//! request passes only when both are present, non-empty and equal. Paths on
//! the configured allow-list skip the check.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;

use crate::config::CsrfConfig;
use crate::error::ApiError;
use crate::path_pattern::PathAllowList;

#[derive(Debug, Clone)]
pub struct CsrfState {
    config: Arc<CsrfConfig>,
    exempt: Arc<PathAllowList>,
}

impl CsrfState {
    pub fn new(config: CsrfConfig) -> Self {
        let exempt = PathAllowList::new(&config.allowed_paths);
        Self {
            config: Arc::new(config),
            exempt: Arc::new(exempt),
        }
    }

    pub fn config(&self) -> &CsrfConfig {
        &self.config
    }

    /// Check the cookie/header pair of a request.
    pub fn verify(&self, request: &Request) -> Result<(), ApiError> {
        if self.exempt.is_allowed(request.uri().path()) {
            return Ok(());
        }

        let jar = CookieJar::from_headers(request.headers());
        let cookie = jar
            .get(&self.config.cookie_name)
            .map(|c| c.value().trim())
            .filter(|v| !v.is_empty());

        let header = request
            .headers()
            .get(self.config.header_name.as_str())
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty());

        match (cookie, header) {
            (Some(cookie), Some(header)) if cookie == header => Ok(()),
            (None, _) => Err(ApiError::csrf_token_invalid()
                .with_details(serde_json::json!({ "reason": "cookie missing" }))),
            (_, None) => Err(ApiError::csrf_token_invalid()
                .with_details(serde_json::json!({ "reason": "header missing" }))),
            _ => Err(ApiError::csrf_token_invalid()
                .with_details(serde_json::json!({ "reason": "token mismatch" }))),
        }
    }
}

/// Rejects with 403 `CSRF_TOKEN_INVALID` unless the pair matches.
pub async fn csrf_middleware(
    State(state): State<CsrfState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Err(err) = state.verify(&request) {
        tracing::info!(
            method = %request.method(),
            path = request.uri().path(),
            "CSRF check failed"
        );
        return Err(err);
    }
    Ok(next.run(request).await)
}
