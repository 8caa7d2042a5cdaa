//! Message REST API Routes
//!
//! Handlers extract chat credentials and group ids from headers, validate the
//! body and hand over to the [`MessageFacade`]. Authentication, the authority
//! gate and the CSRF check have already run when a handler is entered.

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use relay_core::{
    AliasOnlyMessageDto, ForwardMessageDto, MasterKeyDto, MessageDto, VideoCallMessageDto,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::encryption::MessageEncryption;
use crate::error::{ApiError, ApiResult};
use crate::extractors::{header_value, ChatAuthHeaders, ValidatedJson};
use crate::middleware::AuthExtractor;
use crate::services::MessageFacade;
use crate::state::AppState;

pub const RC_GROUP_ID_HEADER: &str = "RCGroupId";
pub const RC_FEEDBACK_GROUP_ID_HEADER: &str = "RCFeedbackGroupId";

/// Query of GET /messages.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageStreamQuery {
    #[serde(rename = "rcGroupId")]
    pub rc_group_id: Option<String>,
}

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// GET /messages - Message stream of a group
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/messages",
    tag = "Messages",
    params(
        ("rcGroupId" = String, Query, description = "Chat group id"),
        ("RCToken" = String, Header, description = "Chat auth token of the caller"),
        ("RCUserId" = String, Header, description = "Chat user id of the caller"),
    ),
    responses(
        (status = 200, description = "Decrypted messages", body = relay_core::MessageStreamDto),
        (status = 204, description = "The group has no messages"),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 403, description = "Forbidden", body = ApiError),
        (status = 503, description = "No encryption master key configured", body = ApiError),
        (status = 502, description = "Chat backend failed", body = ApiError),
    ),
    security(("bearer_auth" = []))
))]
pub async fn get_message_stream(
    State(facade): State<Arc<dyn MessageFacade>>,
    ChatAuthHeaders(credentials): ChatAuthHeaders,
    Query(query): Query<MessageStreamQuery>,
) -> ApiResult<Response> {
    let group_id = query
        .rc_group_id
        .filter(|g| !g.trim().is_empty())
        .ok_or_else(|| ApiError::missing_field("rcGroupId"))?;

    let stream = facade.get_message_stream(&credentials, &group_id).await?;
    if stream.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }
    Ok((StatusCode::OK, Json(stream)).into_response())
}

/// POST /messages/new - Post a message to a group
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/messages/new",
    tag = "Messages",
    request_body = MessageDto,
    params(
        ("RCToken" = String, Header, description = "Chat auth token of the caller"),
        ("RCUserId" = String, Header, description = "Chat user id of the caller"),
        ("RCGroupId" = String, Header, description = "Target group id"),
    ),
    responses(
        (status = 201, description = "Message created", body = relay_core::MessageResponseDto),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 403, description = "Forbidden", body = ApiError),
        (status = 503, description = "No encryption master key configured", body = ApiError),
    ),
    security(("bearer_auth" = []))
))]
pub async fn create_message(
    State(facade): State<Arc<dyn MessageFacade>>,
    ChatAuthHeaders(credentials): ChatAuthHeaders,
    headers: HeaderMap,
    ValidatedJson(message): ValidatedJson<MessageDto>,
) -> ApiResult<impl IntoResponse> {
    let group_id = header_value(&headers, RC_GROUP_ID_HEADER)?;
    let response = facade
        .post_group_message(&credentials, &group_id, message)
        .await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /messages/feedback/new - Post a message to a feedback group
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/messages/feedback/new",
    tag = "Messages",
    request_body = MessageDto,
    params(
        ("RCToken" = String, Header, description = "Chat auth token of the caller"),
        ("RCUserId" = String, Header, description = "Chat user id of the caller"),
        ("RCFeedbackGroupId" = String, Header, description = "Target feedback group id"),
    ),
    responses(
        (status = 201, description = "Message created", body = relay_core::MessageResponseDto),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 403, description = "Forbidden", body = ApiError),
        (status = 503, description = "No encryption master key configured", body = ApiError),
    ),
    security(("bearer_auth" = []))
))]
pub async fn create_feedback_message(
    State(facade): State<Arc<dyn MessageFacade>>,
    ChatAuthHeaders(credentials): ChatAuthHeaders,
    headers: HeaderMap,
    ValidatedJson(message): ValidatedJson<MessageDto>,
) -> ApiResult<impl IntoResponse> {
    let feedback_group_id = header_value(&headers, RC_FEEDBACK_GROUP_ID_HEADER)?;
    let response = facade
        .post_feedback_group_message(&credentials, &feedback_group_id, message)
        .await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /messages/videohint/new - Post a video call hint as the system user
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/messages/videohint/new",
    tag = "Messages",
    request_body = VideoCallMessageDto,
    params(("RCGroupId" = String, Header, description = "Target group id")),
    responses(
        (status = 201, description = "Hint created", body = relay_core::MessageResponseDto),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 403, description = "Forbidden", body = ApiError),
    ),
    security(("bearer_auth" = []))
))]
pub async fn create_video_hint_message(
    State(facade): State<Arc<dyn MessageFacade>>,
    headers: HeaderMap,
    ValidatedJson(video_call): ValidatedJson<VideoCallMessageDto>,
) -> ApiResult<impl IntoResponse> {
    let group_id = header_value(&headers, RC_GROUP_ID_HEADER)?;
    let response = facade
        .create_video_hint_message(&group_id, video_call)
        .await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /messages/aliasonly/new - Post an alias-only message as the system user
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/messages/aliasonly/new",
    tag = "Messages",
    request_body = AliasOnlyMessageDto,
    params(("rcGroupId" = String, Header, description = "Target group id")),
    responses(
        (status = 201, description = "Message created", body = relay_core::MessageResponseDto),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 403, description = "Forbidden", body = ApiError),
    ),
    security(("bearer_auth" = []))
))]
pub async fn create_alias_only_message(
    State(facade): State<Arc<dyn MessageFacade>>,
    headers: HeaderMap,
    ValidatedJson(alias_only): ValidatedJson<AliasOnlyMessageDto>,
) -> ApiResult<impl IntoResponse> {
    let group_id = header_value(&headers, RC_GROUP_ID_HEADER)?;
    let response = facade
        .post_alias_only_message(&group_id, alias_only)
        .await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /messages/key - Replace the encryption master key
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/messages/key",
    tag = "Messages",
    request_body = MasterKeyDto,
    responses(
        (status = 202, description = "Master key updated"),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 403, description = "Forbidden", body = ApiError),
        (status = 409, description = "Master key already set to this value", body = ApiError),
    ),
    security(("bearer_auth" = []))
))]
pub async fn update_key(
    State(encryption): State<Arc<dyn MessageEncryption>>,
    AuthExtractor(auth): AuthExtractor,
    ValidatedJson(master_key): ValidatedJson<MasterKeyDto>,
) -> ApiResult<StatusCode> {
    if encryption.update_master_key(&master_key.master_key)? {
        tracing::info!(user_id = %auth.user_id, "Master key updated");
        Ok(StatusCode::ACCEPTED)
    } else {
        Err(ApiError::state_conflict("Master key is already set to this value"))
    }
}

/// POST /messages/forward - Forward a message into a feedback group
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/messages/forward",
    tag = "Messages",
    request_body = ForwardMessageDto,
    params(
        ("RCToken" = String, Header, description = "Chat auth token of the caller"),
        ("RCUserId" = String, Header, description = "Chat user id of the caller"),
        ("RCFeedbackGroupId" = String, Header, description = "Target feedback group id"),
    ),
    responses(
        (status = 201, description = "Message forwarded", body = relay_core::MessageResponseDto),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 403, description = "Forbidden", body = ApiError),
        (status = 503, description = "No encryption master key configured", body = ApiError),
    ),
    security(("bearer_auth" = []))
))]
pub async fn forward_message(
    State(facade): State<Arc<dyn MessageFacade>>,
    ChatAuthHeaders(credentials): ChatAuthHeaders,
    headers: HeaderMap,
    ValidatedJson(message): ValidatedJson<ForwardMessageDto>,
) -> ApiResult<impl IntoResponse> {
    let feedback_group_id = header_value(&headers, RC_FEEDBACK_GROUP_ID_HEADER)?;
    let response = facade
        .post_forward_message(&credentials, &feedback_group_id, message)
        .await?;
    Ok((StatusCode::CREATED, Json(response)))
}

// ============================================================================
// ROUTER
// ============================================================================

/// Message routes. Every path here must have an entry in the authority table.
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/messages", get(get_message_stream))
        .route("/messages/new", post(create_message))
        .route("/messages/feedback/new", post(create_feedback_message))
        .route("/messages/videohint/new", post(create_video_hint_message))
        .route("/messages/aliasonly/new", post(create_alias_only_message))
        .route("/messages/key", post(update_key))
        .route("/messages/forward", post(forward_message))
}
