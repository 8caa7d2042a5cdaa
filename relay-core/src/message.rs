//! Message DTOs exchanged with clients and with the chat backend.

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};

// ============================================================================
// VALIDATION
// ============================================================================

/// Structural validation for inbound DTOs.
pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError>;
}

fn require_non_blank(value: &str, field: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::RequiredFieldMissing {
            field: field.to_string(),
        });
    }
    Ok(())
}

// ============================================================================
// INBOUND DTOS
// ============================================================================

/// A message written by a user or consultant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct MessageDto {
    /// Plain message text. Encrypted before it leaves the service.
    pub message: String,

    /// Optional RocketChat message type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,

    /// Whether recipients should be notified by mail.
    #[serde(default)]
    pub send_notification: bool,
}

impl Validate for MessageDto {
    fn validate(&self) -> Result<(), ValidationError> {
        require_non_blank(&self.message, "message")
    }
}

/// A message forwarded into a feedback group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct ForwardMessageDto {
    pub message: String,
    /// Timestamp of the original message as sent by the chat backend.
    pub timestamp: String,
    /// Username of the original author.
    pub username: String,
    /// Chat user id of the original author.
    pub rc_user_id: String,
}

impl Validate for ForwardMessageDto {
    fn validate(&self) -> Result<(), ValidationError> {
        require_non_blank(&self.message, "message")?;
        require_non_blank(&self.timestamp, "timestamp")?;
        require_non_blank(&self.username, "username")?;
        require_non_blank(&self.rc_user_id, "rcUserId")
    }
}

/// Kind of video call event announced by a video hint message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VideoCallEventType {
    IgnoredCall,
}

/// Payload of a video hint message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct VideoCallMessageDto {
    pub event_type: VideoCallEventType,
    pub initiator_user_name: String,
    pub initiator_rc_user_id: String,
}

impl Validate for VideoCallMessageDto {
    fn validate(&self) -> Result<(), ValidationError> {
        require_non_blank(&self.initiator_user_name, "initiatorUserName")?;
        require_non_blank(&self.initiator_rc_user_id, "initiatorRcUserId")
    }
}

/// Message types carried in an alias.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    FurtherSteps,
    UpdateSessionData,
    Videocall,
    Forward,
    UserMuted,
    UserUnmuted,
    E2eeActivated,
    FinishedConversation,
    AppointmentSet,
    AppointmentCancelled,
    AppointmentRescheduled,
    ReassignConsultant,
}

impl MessageType {
    pub const ALL: [MessageType; 12] = [
        MessageType::FurtherSteps,
        MessageType::UpdateSessionData,
        MessageType::Videocall,
        MessageType::Forward,
        MessageType::UserMuted,
        MessageType::UserUnmuted,
        MessageType::E2eeActivated,
        MessageType::FinishedConversation,
        MessageType::AppointmentSet,
        MessageType::AppointmentCancelled,
        MessageType::AppointmentRescheduled,
        MessageType::ReassignConsultant,
    ];
}

/// A system message that consists of an alias only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct AliasOnlyMessageDto {
    pub message_type: MessageType,
}

impl Validate for AliasOnlyMessageDto {
    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }
}

/// New encryption master key.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct MasterKeyDto {
    pub master_key: String,
}

impl std::fmt::Debug for MasterKeyDto {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterKeyDto")
            .field("master_key", &"[REDACTED]")
            .finish()
    }
}

impl Validate for MasterKeyDto {
    fn validate(&self) -> Result<(), ValidationError> {
        require_non_blank(&self.master_key, "masterKey")
    }
}

// ============================================================================
// CHAT BACKEND DTOS
// ============================================================================

/// Author of a chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ChatUser {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// A message as stored by the chat backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ChatMessage {
    #[serde(rename = "_id")]
    pub id: String,
    pub rid: String,
    #[serde(default)]
    pub msg: String,
    pub ts: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    pub u: ChatUser,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,
    #[serde(rename = "_updatedAt", default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

/// A page of group messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct MessageStreamDto {
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub count: u32,
    #[serde(default)]
    pub offset: u32,
    #[serde(default)]
    pub total: u32,
    #[serde(default)]
    pub success: bool,
}

impl MessageStreamDto {
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Reference to a message that was just posted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct MessageResponseDto {
    #[serde(rename = "_id")]
    pub id: String,
    pub rid: String,
    pub ts: String,
}
