//! RocketChat client.
//!
//! [`ChatBackend`] is the seam between the relay and the chat server.
//! [`RocketChatClient`] implements it against the RocketChat REST API.
//! Every transport failure, non-success status or `success: false` body is
//! reported as `CHAT_BACKEND_ERROR`.

use async_trait::async_trait;
use relay_core::{MessageResponseDto, MessageStreamDto};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::RwLock;

use crate::config::RocketChatConfig;
use crate::error::{ApiError, ApiResult};

const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";
const USER_ID_HEADER: &str = "X-User-Id";

// ============================================================================
// TYPES
// ============================================================================

/// Credentials of a chat user, as issued by the chat backend.
#[derive(Clone, PartialEq, Eq)]
pub struct ChatCredentials {
    pub user_id: String,
    pub auth_token: String,
}

impl ChatCredentials {
    pub fn new(user_id: impl Into<String>, auth_token: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            auth_token: auth_token.into(),
        }
    }
}

impl std::fmt::Debug for ChatCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatCredentials")
            .field("user_id", &self.user_id)
            .field("auth_token", &"[REDACTED]")
            .finish()
    }
}

/// Body of `chat.postMessage`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostMessageRequest {
    pub room_id: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    /// Message type, e.g. `e2e`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,
}

impl PostMessageRequest {
    pub fn new(room_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            room_id: room_id.into(),
            text: text.into(),
            alias: None,
            t: None,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn with_type(mut self, t: Option<String>) -> Self {
        self.t = t;
        self
    }
}

#[derive(Debug, Deserialize)]
struct PostMessageResponse {
    #[serde(default)]
    success: bool,
    message: Option<MessageResponseDto>,
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    user: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    status: String,
    data: Option<LoginData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginData {
    user_id: String,
    auth_token: String,
}

// ============================================================================
// TRAIT
// ============================================================================

#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Messages of a private group, as seen by `credentials`.
    async fn group_messages(
        &self,
        credentials: &ChatCredentials,
        group_id: &str,
    ) -> ApiResult<MessageStreamDto>;

    async fn post_group_message(
        &self,
        credentials: &ChatCredentials,
        request: &PostMessageRequest,
    ) -> ApiResult<MessageResponseDto>;

    /// Credentials of the technical system user.
    async fn system_credentials(&self) -> ApiResult<ChatCredentials>;

    /// Cheap liveness check of the chat server.
    async fn ping(&self) -> ApiResult<()>;
}

// ============================================================================
// CLIENT
// ============================================================================

pub struct RocketChatClient {
    client: reqwest::Client,
    config: RocketChatConfig,
    system_credentials: RwLock<Option<ChatCredentials>>,
}

impl std::fmt::Debug for RocketChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RocketChatClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl RocketChatClient {
    pub fn new(config: RocketChatConfig) -> ApiResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ApiError::internal_error(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            system_credentials: RwLock::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn login_system_user(&self) -> ApiResult<ChatCredentials> {
        let body = LoginRequest {
            user: &self.config.system_username,
            password: self.config.system_password.expose_secret(),
        };

        let response = self
            .client
            .post(self.url("/api/v1/login"))
            .json(&body)
            .send()
            .await?;
        let response = check_status(response, "login").await?;

        let login: LoginResponse = response.json().await?;
        match (login.status.as_str(), login.data) {
            ("success", Some(data)) => {
                tracing::info!(user_id = %data.user_id, "Chat system user logged in");
                Ok(ChatCredentials::new(data.user_id, data.auth_token))
            }
            (status, _) => Err(ApiError::chat_backend(format!(
                "System user login returned status {}",
                status
            ))),
        }
    }

    /// Drop cached system credentials if they belong to `user_id`.
    async fn invalidate_system_credentials(&self, user_id: &str) {
        let mut cached = self.system_credentials.write().await;
        if cached.as_ref().is_some_and(|c| c.user_id == user_id) {
            tracing::warn!(user_id, "Chat backend rejected system credentials, clearing cache");
            *cached = None;
        }
    }
}

async fn check_status(response: reqwest::Response, operation: &str) -> ApiResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    tracing::warn!(
        operation,
        status = status.as_u16(),
        body = %text,
        "Chat backend call failed"
    );
    Err(ApiError::chat_backend(format!(
        "Chat backend {} failed with HTTP {}",
        operation,
        status.as_u16()
    ))
    .with_details(serde_json::json!({ "status": status.as_u16() })))
}

#[async_trait]
impl ChatBackend for RocketChatClient {
    async fn group_messages(
        &self,
        credentials: &ChatCredentials,
        group_id: &str,
    ) -> ApiResult<MessageStreamDto> {
        let response = self
            .client
            .get(self.url("/api/v1/groups.messages"))
            .query(&[("roomId", group_id)])
            .header(AUTH_TOKEN_HEADER, &credentials.auth_token)
            .header(USER_ID_HEADER, &credentials.user_id)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            self.invalidate_system_credentials(&credentials.user_id).await;
        }
        let response = check_status(response, "groups.messages").await?;

        let stream: MessageStreamDto = response.json().await?;
        if !stream.success {
            return Err(ApiError::chat_backend("groups.messages returned success=false"));
        }

        tracing::debug!(group_id, count = stream.messages.len(), "Fetched group messages");
        Ok(stream)
    }

    async fn post_group_message(
        &self,
        credentials: &ChatCredentials,
        request: &PostMessageRequest,
    ) -> ApiResult<MessageResponseDto> {
        let response = self
            .client
            .post(self.url("/api/v1/chat.postMessage"))
            .header(AUTH_TOKEN_HEADER, &credentials.auth_token)
            .header(USER_ID_HEADER, &credentials.user_id)
            .json(request)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            self.invalidate_system_credentials(&credentials.user_id).await;
        }
        let response = check_status(response, "chat.postMessage").await?;

        let posted: PostMessageResponse = response.json().await?;
        match posted {
            PostMessageResponse {
                success: true,
                message: Some(message),
            } => {
                tracing::debug!(group_id = %request.room_id, message_id = %message.id, "Message posted");
                Ok(message)
            }
            _ => Err(ApiError::chat_backend("chat.postMessage returned success=false")),
        }
    }

    async fn system_credentials(&self) -> ApiResult<ChatCredentials> {
        if let Some(credentials) = self.system_credentials.read().await.clone() {
            return Ok(credentials);
        }

        let mut cached = self.system_credentials.write().await;
        if let Some(credentials) = cached.clone() {
            return Ok(credentials);
        }

        let credentials = self.login_system_user().await?;
        *cached = Some(credentials.clone());
        Ok(credentials)
    }

    async fn ping(&self) -> ApiResult<()> {
        let response = self.client.get(self.url("/api/info")).send().await?;
        check_status(response, "info").await?;
        Ok(())
    }
}
