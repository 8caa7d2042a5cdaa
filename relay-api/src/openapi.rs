//! OpenAPI Specification for the relay API
//!
//! Generated by utoipa from the route annotations and DTO schemas.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::error::{ApiError, ErrorCode};
use crate::routes::health::{ComponentHealth, HealthDetails, HealthResponse, HealthStatus};
use crate::routes::{health, message};
use crate::telemetry::metrics;

use relay_core::{
    AliasOnlyMessageDto, ChatMessage, ChatUser, ForwardMessageDto, MasterKeyDto, MessageDto,
    MessageResponseDto, MessageStreamDto, MessageType, VideoCallEventType, VideoCallMessageDto,
};

/// OpenAPI document for the relay API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Message Relay API",
        version = "0.1.0",
        description = "Encrypting message relay between counselling clients and the chat backend",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "http://localhost:8080", description = "Local Development")
    ),
    tags(
        (name = "Messages", description = "Message stream, creation, forwarding and key management"),
        (name = "Actuator", description = "Health probes and metrics")
    ),
    paths(
        message::get_message_stream,
        message::create_message,
        message::create_feedback_message,
        message::create_video_hint_message,
        message::create_alias_only_message,
        message::update_key,
        message::forward_message,

        health::liveness,
        health::readiness,
        metrics::metrics_handler,
    ),
    components(
        schemas(
            ApiError, ErrorCode,

            MessageDto, ForwardMessageDto, VideoCallMessageDto, VideoCallEventType,
            AliasOnlyMessageDto, MessageType, MasterKeyDto,
            ChatUser, ChatMessage, MessageStreamDto, MessageResponseDto,

            HealthResponse, HealthStatus, HealthDetails, ComponentHealth
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Security scheme modifier for OpenAPI document.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("Access token of the identity provider"))
                        .build(),
                ),
            );
        }
    }
}

impl ApiDoc {
    /// Generate OpenAPI spec as JSON string.
    pub fn to_json() -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::openapi())
    }
}
