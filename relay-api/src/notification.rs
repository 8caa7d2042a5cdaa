//! New-message mail notifications.
//!
//! Notifications are best-effort. Failures are logged and never surface to
//! the caller that posted the message.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

use crate::error::{ApiError, ApiResult};
use crate::telemetry::metrics;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NewMessageNotification<'a> {
    rc_group_id: &'a str,
}

#[async_trait]
pub trait MessageNotifier: Send + Sync {
    /// A message was posted to a session group.
    async fn new_message(&self, group_id: &str);

    /// A message was posted to a feedback group.
    async fn new_feedback_message(&self, group_id: &str);
}

/// Does nothing. Used when no user service is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

#[async_trait]
impl MessageNotifier for NoopNotifier {
    async fn new_message(&self, group_id: &str) {
        tracing::debug!(group_id, "No user service configured, skipping notification");
    }

    async fn new_feedback_message(&self, group_id: &str) {
        tracing::debug!(group_id, "No user service configured, skipping notification");
    }
}

/// Calls the user service mail endpoints.
#[derive(Debug, Clone)]
pub struct UserServiceNotifier {
    client: reqwest::Client,
    base_url: String,
}

impl UserServiceNotifier {
    pub fn new(base_url: impl Into<String>) -> ApiResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ApiError::internal_error(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn send(&self, path: &str, group_id: &str) -> ApiResult<()> {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .json(&NewMessageNotification {
                rc_group_id: group_id,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::chat_backend(format!(
                "User service answered HTTP {}",
                status.as_u16()
            )));
        }
        Ok(())
    }

    async fn notify(&self, kind: &str, path: &str, group_id: &str) {
        let result = self.send(path, group_id).await;
        if let Some(metrics) = metrics() {
            metrics.record_notification(kind, result.is_ok());
        }
        if let Err(err) = result {
            tracing::warn!(group_id, path, error = %err, "Mail notification failed");
        }
    }
}

#[async_trait]
impl MessageNotifier for UserServiceNotifier {
    async fn new_message(&self, group_id: &str) {
        self.notify("message", "/users/mails/messages/new", group_id).await;
    }

    async fn new_feedback_message(&self, group_id: &str) {
        self.notify("feedback", "/users/mails/messages/feedback/new", group_id).await;
    }
}
