//! Endpoint authority rules.
//!
//! One static table maps each message endpoint to the authorities that may
//! call it. A caller passes if it holds any of the listed authorities.
//! Endpoints without a rule are denied.

use axum::http::Method;
use relay_core::Authority;

use crate::auth::AuthContext;
use crate::error::{ApiError, ApiResult};

/// Authority requirement for one method and route template.
#[derive(Debug, Clone, Copy)]
pub struct EndpointRule {
    pub method: &'static str,
    pub path: &'static str,
    pub any_of: &'static [Authority],
}

pub const ENDPOINT_RULES: &[EndpointRule] = &[
    EndpointRule {
        method: "GET",
        path: "/messages",
        any_of: &[Authority::ConsultantDefault, Authority::UserDefault],
    },
    EndpointRule {
        method: "POST",
        path: "/messages/new",
        any_of: &[
            Authority::ConsultantDefault,
            Authority::UserDefault,
            Authority::TechnicalDefault,
        ],
    },
    EndpointRule {
        method: "POST",
        path: "/messages/key",
        any_of: &[Authority::TechnicalDefault],
    },
    EndpointRule {
        method: "POST",
        path: "/messages/forward",
        any_of: &[Authority::UseFeedback],
    },
    EndpointRule {
        method: "POST",
        path: "/messages/feedback/new",
        any_of: &[Authority::UseFeedback],
    },
    EndpointRule {
        method: "POST",
        path: "/messages/videohint/new",
        any_of: &[Authority::UserDefault, Authority::ConsultantDefault],
    },
    EndpointRule {
        method: "POST",
        path: "/messages/aliasonly/new",
        any_of: &[Authority::UserDefault],
    },
];

/// Authorities that may call `method path`, or `None` if no rule exists.
pub fn required_authorities(method: &Method, path: &str) -> Option<&'static [Authority]> {
    ENDPOINT_RULES
        .iter()
        .find(|rule| rule.method == method.as_str() && rule.path == path)
        .map(|rule| rule.any_of)
}

/// Decide whether `auth` may call `method path`.
pub fn authorize(auth: &AuthContext, method: &Method, path: &str) -> ApiResult<()> {
    let Some(any_of) = required_authorities(method, path) else {
        return Err(ApiError::forbidden(format!(
            "No access rule for {} {}",
            method, path
        )));
    };

    if auth.has_any_authority(any_of) {
        Ok(())
    } else {
        Err(ApiError::forbidden(format!(
            "Missing authority for {} {}",
            method, path
        )))
    }
}
