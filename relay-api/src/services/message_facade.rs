//! Message facade.
//!
//! Combines the chat backend, the encryption service and the notifier. Text
//! written by users is always encrypted with the id of the target group
//! before it is handed to the chat backend.

use async_trait::async_trait;
use relay_core::{
    AliasMessageDto, AliasOnlyMessageDto, ForwardMessageDto, MessageDto, MessageResponseDto,
    MessageStreamDto, VideoCallMessageDto,
};
use std::sync::Arc;

use crate::encryption::MessageEncryption;
use crate::error::ApiResult;
use crate::notification::MessageNotifier;
use crate::rocketchat::{ChatBackend, ChatCredentials, PostMessageRequest};
use crate::telemetry::metrics;

#[async_trait]
pub trait MessageFacade: Send + Sync {
    /// Messages of `group_id`, decrypted.
    async fn get_message_stream(
        &self,
        credentials: &ChatCredentials,
        group_id: &str,
    ) -> ApiResult<MessageStreamDto>;

    async fn post_group_message(
        &self,
        credentials: &ChatCredentials,
        group_id: &str,
        message: MessageDto,
    ) -> ApiResult<MessageResponseDto>;

    async fn post_feedback_group_message(
        &self,
        credentials: &ChatCredentials,
        feedback_group_id: &str,
        message: MessageDto,
    ) -> ApiResult<MessageResponseDto>;

    async fn post_forward_message(
        &self,
        credentials: &ChatCredentials,
        feedback_group_id: &str,
        message: ForwardMessageDto,
    ) -> ApiResult<MessageResponseDto>;

    /// Posted by the system user.
    async fn create_video_hint_message(
        &self,
        group_id: &str,
        video_call: VideoCallMessageDto,
    ) -> ApiResult<MessageResponseDto>;

    /// Posted by the system user.
    async fn post_alias_only_message(
        &self,
        group_id: &str,
        alias_only: AliasOnlyMessageDto,
    ) -> ApiResult<MessageResponseDto>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NotificationKind {
    Message,
    Feedback,
}

/// [`MessageFacade`] on top of the chat backend.
#[derive(Clone)]
pub struct RelayMessageFacade {
    chat: Arc<dyn ChatBackend>,
    encryption: Arc<dyn MessageEncryption>,
    notifier: Arc<dyn MessageNotifier>,
}

impl RelayMessageFacade {
    pub fn new(
        chat: Arc<dyn ChatBackend>,
        encryption: Arc<dyn MessageEncryption>,
        notifier: Arc<dyn MessageNotifier>,
    ) -> Self {
        Self {
            chat,
            encryption,
            notifier,
        }
    }

    async fn post(
        &self,
        kind: &'static str,
        credentials: &ChatCredentials,
        request: PostMessageRequest,
    ) -> ApiResult<MessageResponseDto> {
        let result = self.chat.post_group_message(credentials, &request).await;
        if let Some(metrics) = metrics() {
            metrics.record_message_relayed(kind, result.is_ok());
        }
        match &result {
            Ok(response) => {
                tracing::info!(kind, group_id = %request.room_id, message_id = %response.id, "Message relayed")
            }
            Err(err) => {
                tracing::warn!(kind, group_id = %request.room_id, error = %err, "Message relay failed")
            }
        }
        result
    }

    async fn post_encrypted(
        &self,
        kind: &'static str,
        credentials: &ChatCredentials,
        group_id: &str,
        message: MessageDto,
        notification: NotificationKind,
    ) -> ApiResult<MessageResponseDto> {
        let text = self.encryption.encrypt(&message.message, group_id)?;
        let request = PostMessageRequest::new(group_id, text).with_type(message.t);
        let response = self.post(kind, credentials, request).await?;

        if message.send_notification {
            self.spawn_notification(group_id, notification);
        }
        Ok(response)
    }

    /// Notify in the background. The relayed request never waits for it.
    fn spawn_notification(&self, group_id: &str, kind: NotificationKind) {
        let notifier = Arc::clone(&self.notifier);
        let group_id = group_id.to_string();
        tokio::spawn(async move {
            match kind {
                NotificationKind::Message => notifier.new_message(&group_id).await,
                NotificationKind::Feedback => notifier.new_feedback_message(&group_id).await,
            }
        });
    }

    async fn post_as_system_user(
        &self,
        kind: &'static str,
        group_id: &str,
        alias: AliasMessageDto,
    ) -> ApiResult<MessageResponseDto> {
        let credentials = self.chat.system_credentials().await?;
        let request = PostMessageRequest::new(group_id, "").with_alias(alias.encode()?);
        self.post(kind, &credentials, request).await
    }
}

#[async_trait]
impl MessageFacade for RelayMessageFacade {
    async fn get_message_stream(
        &self,
        credentials: &ChatCredentials,
        group_id: &str,
    ) -> ApiResult<MessageStreamDto> {
        let mut stream = self.chat.group_messages(credentials, group_id).await?;
        for message in &mut stream.messages {
            message.msg = self.encryption.decrypt(&message.msg, group_id)?;
        }
        Ok(stream)
    }

    async fn post_group_message(
        &self,
        credentials: &ChatCredentials,
        group_id: &str,
        message: MessageDto,
    ) -> ApiResult<MessageResponseDto> {
        self.post_encrypted("group", credentials, group_id, message, NotificationKind::Message)
            .await
    }

    async fn post_feedback_group_message(
        &self,
        credentials: &ChatCredentials,
        feedback_group_id: &str,
        message: MessageDto,
    ) -> ApiResult<MessageResponseDto> {
        self.post_encrypted(
            "feedback",
            credentials,
            feedback_group_id,
            message,
            NotificationKind::Feedback,
        )
        .await
    }

    async fn post_forward_message(
        &self,
        credentials: &ChatCredentials,
        feedback_group_id: &str,
        message: ForwardMessageDto,
    ) -> ApiResult<MessageResponseDto> {
        let alias = AliasMessageDto::forward(&message).encode()?;
        let text = self.encryption.encrypt(&message.message, feedback_group_id)?;
        let request = PostMessageRequest::new(feedback_group_id, text).with_alias(alias);
        self.post("forward", credentials, request).await
    }

    async fn create_video_hint_message(
        &self,
        group_id: &str,
        video_call: VideoCallMessageDto,
    ) -> ApiResult<MessageResponseDto> {
        self.post_as_system_user("videohint", group_id, AliasMessageDto::video_call(video_call))
            .await
    }

    async fn post_alias_only_message(
        &self,
        group_id: &str,
        alias_only: AliasOnlyMessageDto,
    ) -> ApiResult<MessageResponseDto> {
        self.post_as_system_user(
            "aliasonly",
            group_id,
            AliasMessageDto::message_type(alias_only.message_type),
        )
        .await
    }
}
