//! Chat message alias payloads.
//!
//! The chat backend stores a free-form `alias` string next to every message.
//! Relay metadata travels there as URL-encoded JSON.

use crate::error::AliasError;
use crate::message::{ForwardMessageDto, MessageType, VideoCallMessageDto};
use serde::{Deserialize, Serialize};

/// Forward metadata stored in an alias. Never carries the message text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardAliasDto {
    pub timestamp: String,
    pub username: String,
    pub rc_user_id: String,
}

impl From<&ForwardMessageDto> for ForwardAliasDto {
    fn from(dto: &ForwardMessageDto) -> Self {
        Self {
            timestamp: dto.timestamp.clone(),
            username: dto.username.clone(),
            rc_user_id: dto.rc_user_id.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasMessageDto {
    #[serde(rename = "forwardMessageDTO", default, skip_serializing_if = "Option::is_none")]
    pub forward_message: Option<ForwardAliasDto>,

    #[serde(rename = "videoCallMessageDTO", default, skip_serializing_if = "Option::is_none")]
    pub video_call_message: Option<VideoCallMessageDto>,

    #[serde(rename = "messageType", default, skip_serializing_if = "Option::is_none")]
    pub message_type: Option<MessageType>,
}

impl AliasMessageDto {
    pub fn forward(dto: &ForwardMessageDto) -> Self {
        Self {
            forward_message: Some(dto.into()),
            message_type: Some(MessageType::Forward),
            ..Default::default()
        }
    }

    pub fn video_call(dto: VideoCallMessageDto) -> Self {
        Self {
            video_call_message: Some(dto),
            message_type: Some(MessageType::Videocall),
            ..Default::default()
        }
    }

    pub fn message_type(message_type: MessageType) -> Self {
        Self {
            message_type: Some(message_type),
            ..Default::default()
        }
    }

    /// Serialize to the URL-encoded JSON string stored by the chat backend.
    pub fn encode(&self) -> Result<String, AliasError> {
        let json = serde_json::to_string(self).map_err(|e| AliasError::Serialize {
            reason: e.to_string(),
        })?;
        Ok(urlencoding::encode(&json).into_owned())
    }

    /// Parse an alias string produced by [`AliasMessageDto::encode`].
    pub fn decode(alias: &str) -> Result<Self, AliasError> {
        let json = urlencoding::decode(alias).map_err(|e| AliasError::Decode {
            reason: e.to_string(),
        })?;
        serde_json::from_str(&json).map_err(|e| AliasError::Decode {
            reason: e.to_string(),
        })
    }
}
