//! End-to-end relay tests through the real message facade.
//!
//! The chat backend, encryption and notifier are recording fakes. Checks that
//! no plaintext reaches the backend, that alias payloads carry metadata only
//! and that notifications are sent in the background.

use std::time::Duration;

use axum::http::{Method, StatusCode};
use relay_api::ErrorCode;
use relay_core::{AliasMessageDto, Authority, MessageType};
use relay_test_utils::assertions::assert_error_body;
use relay_test_utils::fixtures::{self, bearer_with_authorities};
use relay_test_utils::{Notification, RecordingChatBackend};
use serde_json::json;
use tower::ServiceExt;

#[path = "support/app.rs"]
mod test_app_support;
use test_app_support::{body_bytes, relay_app, RequestSpec};

#[tokio::test]
async fn test_group_message_is_encrypted_with_group_id() {
    let app = relay_app(RecordingChatBackend::new());
    let config = fixtures::auth_config();

    let response = app
        .router
        .clone()
        .oneshot(
            RequestSpec::new(Method::POST, "/messages/new")
                .bearer(bearer_with_authorities(&config, &[Authority::UserDefault]))
                .json(json!({ "message": "Vertraulich", "t": "e2e" }))
                .build(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let body: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(body["rid"], fixtures::RC_GROUP_ID);

    let posted = app.chat.posted();
    assert_eq!(posted.len(), 1);
    let (credentials, request) = &posted[0];
    assert_eq!(credentials.user_id, fixtures::RC_USER_ID);
    assert_eq!(credentials.auth_token, fixtures::RC_TOKEN);
    assert_eq!(request.room_id, fixtures::RC_GROUP_ID);
    assert!(!request.text.contains("Vertraulich"));
    assert!(request.text.starts_with(relay_api::ENCRYPTED_PREFIX));
    assert!(request.text.contains(fixtures::RC_GROUP_ID));
    assert_eq!(request.t.as_deref(), Some("e2e"));
    assert!(request.alias.is_none());
}

#[tokio::test]
async fn test_notification_is_sent_when_requested() {
    let app = relay_app(RecordingChatBackend::new());
    let config = fixtures::auth_config();

    let response = app
        .router
        .clone()
        .oneshot(
            RequestSpec::new(Method::POST, "/messages/feedback/new")
                .bearer(bearer_with_authorities(&config, &[Authority::UseFeedback]))
                .json(json!({ "message": "Feedback", "sendNotification": true }))
                .build(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    assert!(app.notifier.wait_for(1, Duration::from_secs(2)).await);
    assert_eq!(
        app.notifier.notifications(),
        vec![Notification::NewFeedbackMessage(
            fixtures::RC_FEEDBACK_GROUP_ID.to_string()
        )]
    );
}

#[tokio::test]
async fn test_no_notification_by_default() {
    let app = relay_app(RecordingChatBackend::new());
    let config = fixtures::auth_config();

    let response = app
        .router
        .clone()
        .oneshot(
            RequestSpec::new(Method::POST, "/messages/new")
                .bearer(bearer_with_authorities(&config, &[Authority::ConsultantDefault]))
                .json(json!({ "message": "Hallo" }))
                .build(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    assert!(!app.notifier.wait_for(1, Duration::from_millis(100)).await);
}

#[tokio::test]
async fn test_forward_alias_carries_metadata_only() {
    let app = relay_app(RecordingChatBackend::new());
    let config = fixtures::auth_config();
    let forward = fixtures::forward_message_dto();

    let response = app
        .router
        .clone()
        .oneshot(
            RequestSpec::new(Method::POST, "/messages/forward")
                .bearer(bearer_with_authorities(&config, &[Authority::UseFeedback]))
                .json(serde_json::to_value(&forward).unwrap())
                .build(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let posted = app.chat.posted();
    let (_, request) = &posted[0];
    assert_eq!(request.room_id, fixtures::RC_FEEDBACK_GROUP_ID);
    assert!(!request.text.contains(&forward.message));

    let encoded = request.alias.as_deref().unwrap();
    assert!(!encoded.contains("Weiterleitung"));
    let alias = AliasMessageDto::decode(encoded).unwrap();
    assert_eq!(alias.message_type, Some(MessageType::Forward));
    let meta = alias.forward_message.unwrap();
    assert_eq!(meta.username, forward.username);
    assert_eq!(meta.rc_user_id, forward.rc_user_id);
    assert_eq!(meta.timestamp, forward.timestamp);
}

#[tokio::test]
async fn test_video_hint_is_posted_by_system_user() {
    let app = relay_app(RecordingChatBackend::new());
    let config = fixtures::auth_config();

    let response = app
        .router
        .clone()
        .oneshot(
            RequestSpec::new(Method::POST, "/messages/videohint/new")
                .bearer(bearer_with_authorities(&config, &[Authority::ConsultantDefault]))
                .json(serde_json::to_value(fixtures::video_call_message_dto()).unwrap())
                .build(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(app.chat.system_logins(), 1);

    let posted = app.chat.posted();
    let (credentials, request) = &posted[0];
    assert_eq!(credentials.user_id, fixtures::SYSTEM_USER_ID);
    assert_eq!(request.text, "");

    let alias = AliasMessageDto::decode(request.alias.as_deref().unwrap()).unwrap();
    assert_eq!(alias.message_type, Some(MessageType::Videocall));
    assert_eq!(
        alias.video_call_message,
        Some(fixtures::video_call_message_dto())
    );
}

#[tokio::test]
async fn test_alias_only_message_is_posted_by_system_user() {
    let app = relay_app(RecordingChatBackend::new());
    let config = fixtures::auth_config();

    let response = app
        .router
        .clone()
        .oneshot(
            RequestSpec::new(Method::POST, "/messages/aliasonly/new")
                .bearer(bearer_with_authorities(&config, &[Authority::UserDefault]))
                .json(json!({ "messageType": "FINISHED_CONVERSATION" }))
                .build(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let posted = app.chat.posted();
    let (credentials, request) = &posted[0];
    assert_eq!(credentials.user_id, fixtures::SYSTEM_USER_ID);
    let alias = AliasMessageDto::decode(request.alias.as_deref().unwrap()).unwrap();
    assert_eq!(alias, AliasMessageDto::message_type(MessageType::FinishedConversation));
}

#[tokio::test]
async fn test_stream_is_decrypted() {
    let encryption = relay_test_utils::RecordingEncryption::new();
    let ciphertext = relay_api::MessageEncryption::encrypt(
        &encryption,
        "Guten Tag",
        fixtures::RC_GROUP_ID,
    )
    .unwrap();
    let stream = fixtures::stream_of(vec![
        fixtures::chat_message(fixtures::RC_GROUP_ID, "m1", &ciphertext),
        fixtures::chat_message(fixtures::RC_GROUP_ID, "m2", "unencrypted system text"),
    ]);
    let app = relay_app(RecordingChatBackend::new().with_stream(stream));
    let config = fixtures::auth_config();

    let response = app
        .router
        .clone()
        .oneshot(
            RequestSpec::new(Method::GET, "/messages?rcGroupId=GROUPxyz12345abcd")
                .bearer(bearer_with_authorities(&config, &[Authority::UserDefault]))
                .build(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(body["messages"][0]["msg"], "Guten Tag");
    assert_eq!(body["messages"][1]["msg"], "unencrypted system text");
    assert_eq!(body["count"], 2);
}

#[tokio::test]
async fn test_missing_group_header_is_bad_request() {
    let app = relay_app(RecordingChatBackend::new());
    let config = fixtures::auth_config();
    let mut request = RequestSpec::new(Method::POST, "/messages/new")
        .bearer(bearer_with_authorities(&config, &[Authority::UserDefault]))
        .json(json!({ "message": "Hallo" }))
        .build();
    request.headers_mut().remove("RCGroupId");

    let response = app.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(app.chat.posted().is_empty());
}

#[tokio::test]
async fn test_readiness_reports_unreachable_backend() {
    let app = relay_app(RecordingChatBackend::new().unhealthy());
    let response = app
        .router
        .clone()
        .oneshot(RequestSpec::new(Method::GET, "/actuator/health/readiness").build())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(body["status"], "unhealthy");
    assert_eq!(body["details"]["chat_backend"]["status"], "unhealthy");
}

#[tokio::test]
async fn test_messages_wait_for_master_key() {
    let app = test_app_support::relay_app_with_encryption(
        RecordingChatBackend::new(),
        std::sync::Arc::new(relay_api::AesEncryptionService::without_key()),
    );
    let config = fixtures::auth_config();
    let post = || {
        RequestSpec::new(Method::POST, "/messages/new")
            .bearer(bearer_with_authorities(&config, &[Authority::UserDefault]))
            .json(json!({ "message": "Vertraulich" }))
            .build()
    };

    let response = app.router.clone().oneshot(post()).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_error_body(&body_bytes(response).await, ErrorCode::ServiceUnavailable);
    assert!(app.chat.posted().is_empty());

    let response = app
        .router
        .clone()
        .oneshot(
            RequestSpec::new(Method::POST, "/messages/key")
                .bearer(bearer_with_authorities(&config, &[Authority::TechnicalDefault]))
                .json(json!({ "masterKey": "first-master-key" }))
                .build(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let response = app.router.clone().oneshot(post()).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let posted = app.chat.posted();
    assert_eq!(posted.len(), 1);
    assert!(!posted[0].1.text.contains("Vertraulich"));
}
