//! REST API Route Handlers
//!
//! Assembles the message routes, the actuator endpoints and the middleware
//! stack. Request flow through the layers:
//!
//! ```text
//! CORS -> observability -> authentication -> tenant filter
//!      -> authority gate -> CSRF -> handler
//! ```
//!
//! The authority gate and the CSRF check are route layers of the message
//! routes only. Actuator endpoints and `/openapi.json` are public.

pub mod health;
pub mod message;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::{header, header::HeaderName, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::get,
    Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::auth::AuthConfig;
use crate::config::{ApiConfig, CsrfConfig, RelayConfig};
use crate::error::{ApiError, ApiResult};
use crate::middleware::{
    auth_middleware, authority_middleware, csrf_middleware, tenant_filter_middleware,
    AuthMiddlewareState, CsrfState, TenantFilterState,
};
use crate::state::AppState;
use crate::telemetry::{metrics_handler, observability_middleware};
use crate::tenant::{AccessTokenTenantResolver, TenantResolver};

pub use health::create_router as health_router;
pub use message::create_router as message_router;

#[cfg(feature = "openapi")]
async fn openapi_json() -> impl axum::response::IntoResponse {
    use utoipa::OpenApi;
    axum::Json(crate::openapi::ApiDoc::openapi())
}

async fn not_found() -> ApiError {
    ApiError::not_found("No such endpoint")
}

// ============================================================================
// SECURE ROUTER BUILDER
// ============================================================================

/// Builds the complete router with authentication, tenant resolution,
/// authority checks and CSRF protection.
pub struct SecureRouterBuilder {
    state: AppState,
    api_config: ApiConfig,
    auth_state: AuthMiddlewareState,
    csrf_state: CsrfState,
    csrf_header: String,
    tenant_state: Option<TenantFilterState>,
}

impl SecureRouterBuilder {
    pub fn new(
        state: AppState,
        api_config: ApiConfig,
        auth_config: AuthConfig,
        csrf_config: CsrfConfig,
    ) -> ApiResult<Self> {
        auth_config.validate_for_production()?;

        Ok(Self {
            state,
            api_config,
            auth_state: AuthMiddlewareState::new(auth_config),
            csrf_header: csrf_config.header_name.clone(),
            csrf_state: CsrfState::new(csrf_config),
            tenant_state: None,
        })
    }

    /// Builder from the aggregate configuration. Installs the access-token
    /// tenant resolver when multi-tenancy is enabled.
    pub fn from_config(state: AppState, config: &RelayConfig) -> ApiResult<Self> {
        let builder = Self::new(
            state,
            config.api.clone(),
            config.auth.clone(),
            config.csrf.clone(),
        )?;

        if config.multitenancy_enabled {
            tracing::info!("Multi-tenancy enabled, installing tenant filter");
            Ok(builder.with_tenant_resolver(Arc::new(AccessTokenTenantResolver)))
        } else {
            Ok(builder)
        }
    }

    pub fn with_tenant_resolver(mut self, resolver: Arc<dyn TenantResolver>) -> Self {
        self.tenant_state = Some(TenantFilterState::new(resolver));
        self
    }

    pub fn with_tenant_filter(mut self, tenant_state: TenantFilterState) -> Self {
        self.tenant_state = Some(tenant_state);
        self
    }

    pub fn build(self) -> Router {
        // Route layers run innermost first: the authority gate, then CSRF
        let message_routes = message::create_router()
            .route_layer(from_fn_with_state(self.csrf_state, csrf_middleware))
            .route_layer(from_fn(authority_middleware));

        #[allow(unused_mut)]
        let mut router = Router::new()
            .merge(message_routes)
            .merge(health::create_router())
            .route("/actuator/prometheus", get(metrics_handler));

        #[cfg(feature = "openapi")]
        {
            router = router.route("/openapi.json", get(openapi_json));
        }

        let mut router = router.fallback(not_found).with_state(self.state);

        if let Some(tenant_state) = self.tenant_state {
            router = router.layer(from_fn_with_state(tenant_state, tenant_filter_middleware));
        }

        let cors = build_cors_layer(&self.api_config, &self.csrf_header);

        router
            .layer(from_fn_with_state(self.auth_state, auth_middleware))
            .layer(from_fn(observability_middleware))
            .layer(cors)
    }
}

// ============================================================================
// CORS
// ============================================================================

/// Build CORS layer from configuration.
fn build_cors_layer(config: &ApiConfig, csrf_header: &str) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .max_age(Duration::from_secs(config.cors_max_age_secs));

    if config.cors_origins.is_empty() {
        // Development mode: allow all origins
        tracing::info!("CORS: Development mode - allowing all origins");
        return cors.allow_origin(Any).allow_headers(Any);
    }

    tracing::info!(
        "CORS: Production mode - allowing origins: {:?}",
        config.cors_origins
    );

    let mut headers = vec![
        header::AUTHORIZATION,
        header::CONTENT_TYPE,
        header::ACCEPT,
        HeaderName::from_static("rctoken"),
        HeaderName::from_static("rcuserid"),
        HeaderName::from_static("rcgroupid"),
        HeaderName::from_static("rcfeedbackgroupid"),
    ];
    match HeaderName::from_bytes(csrf_header.as_bytes()) {
        Ok(name) => headers.push(name),
        Err(_) => tracing::warn!(csrf_header, "CSRF header name is not a valid header name"),
    }

    let allowed = config.clone();
    let cors = cors
        .allow_origin(AllowOrigin::predicate(
            move |origin: &HeaderValue, _request_parts| {
                origin
                    .to_str()
                    .map(|o| allowed.is_origin_allowed(o))
                    .unwrap_or(false)
            },
        ))
        .allow_headers(headers);

    if config.cors_allow_credentials {
        cors.allow_credentials(true)
    } else {
        cors
    }
}
