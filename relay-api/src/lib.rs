//! Relay API - HTTP layer of the counselling message relay
//!
//! Accepts authenticated requests to read, create, forward and encrypt chat
//! messages and relays them to the RocketChat backend. Every message route
//! passes authentication, the tenant filter, a per-endpoint authority gate
//! and a double-submit CSRF check before the handler runs.

pub mod auth;
pub mod authorization;
pub mod config;
pub mod encryption;
pub mod error;
pub mod extractors;
pub mod macros;
pub mod middleware;
pub mod notification;
#[cfg(feature = "openapi")]
pub mod openapi;
pub mod path_pattern;
pub mod rocketchat;
pub mod routes;
pub mod services;
pub mod state;
pub mod telemetry;
pub mod tenant;

// Re-export commonly used types
pub use auth::{
    authenticate, encode_jwt_token, generate_jwt_token, validate_jwt_token, AuthConfig,
    AuthContext, Claims, FixedClock, JwtClock, SystemClock,
};
pub use authorization::{authorize, required_authorities, EndpointRule, ENDPOINT_RULES};
pub use config::{ApiConfig, CsrfConfig, RelayConfig, RocketChatConfig};
pub use encryption::{AesEncryptionService, MessageEncryption, ENCRYPTED_PREFIX};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use middleware::{AuthExtractor, CsrfState, TenantFilterState};
pub use notification::{MessageNotifier, NoopNotifier, UserServiceNotifier};
#[cfg(feature = "openapi")]
pub use openapi::ApiDoc;
pub use path_pattern::{PathAllowList, PathPattern};
pub use rocketchat::{ChatBackend, ChatCredentials, PostMessageRequest, RocketChatClient};
pub use routes::SecureRouterBuilder;
pub use services::{MessageFacade, RelayMessageFacade};
pub use state::AppState;
pub use tenant::{AccessTokenTenantResolver, TenantResolver, TENANT_FILTER_ALLOW_LIST};
