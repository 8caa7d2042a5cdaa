//! Chat backend credentials passed by the client as request headers.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};

use crate::error::{ApiError, ApiResult};
use crate::rocketchat::ChatCredentials;

pub const RC_TOKEN_HEADER: &str = "RCToken";
pub const RC_USER_ID_HEADER: &str = "RCUserId";

/// Non-blank value of header `name`. Lookup is case-insensitive.
pub fn header_value(headers: &HeaderMap, name: &str) -> ApiResult<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ApiError::missing_field(name))
}

/// The caller's chat credentials from the `RCToken` and `RCUserId` headers.
///
/// ```rust,ignore
/// async fn handler(ChatAuthHeaders(credentials): ChatAuthHeaders) { ... }
/// ```
#[derive(Debug, Clone)]
pub struct ChatAuthHeaders(pub ChatCredentials);

#[async_trait]
impl<S> FromRequestParts<S> for ChatAuthHeaders
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let auth_token = header_value(&parts.headers, RC_TOKEN_HEADER)?;
        let user_id = header_value(&parts.headers, RC_USER_ID_HEADER)?;
        Ok(ChatAuthHeaders(ChatCredentials::new(user_id, auth_token)))
    }
}
