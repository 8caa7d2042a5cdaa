//! Relay Test Utilities
//!
//! Shared test infrastructure for the relay workspace:
//! - Recording fakes for every collaborator trait of the API
//! - Proptest generators for the message DTOs
//! - Fixtures for tokens and CSRF pairs
//! - Assertions on API error responses

pub use relay_core::{
    AliasOnlyMessageDto, Authority, ChatMessage, ChatUser, ForwardMessageDto, MasterKeyDto,
    MessageDto, MessageResponseDto, MessageStreamDto, MessageType, Role, TenantId,
    VideoCallEventType, VideoCallMessageDto,
};

use async_trait::async_trait;
use axum::extract::Request;
use relay_api::{
    ApiError, ApiResult, ChatBackend, ChatCredentials, MessageEncryption, MessageFacade,
    MessageNotifier, PostMessageRequest, TenantResolver, ENCRYPTED_PREFIX,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Notify;

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

// ============================================================================
// RECORDING FAKES
// ============================================================================

/// Facade operation recorded by [`RecordingFacade`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FacadeCall {
    GetMessageStream { group_id: String },
    PostGroupMessage { group_id: String, message: MessageDto },
    PostFeedbackGroupMessage { feedback_group_id: String, message: MessageDto },
    PostForwardMessage { feedback_group_id: String, message: ForwardMessageDto },
    CreateVideoHintMessage { group_id: String, video_call: VideoCallMessageDto },
    PostAliasOnlyMessage { group_id: String, alias_only: AliasOnlyMessageDto },
}

/// [`MessageFacade`] that records every call and answers with canned data.
#[derive(Debug, Default)]
pub struct RecordingFacade {
    calls: Mutex<Vec<FacadeCall>>,
    stream: Mutex<Option<MessageStreamDto>>,
}

impl RecordingFacade {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stream returned by `get_message_stream`. Defaults to an empty stream.
    pub fn with_stream(self, stream: MessageStreamDto) -> Self {
        *lock(&self.stream) = Some(stream);
        self
    }

    pub fn calls(&self) -> Vec<FacadeCall> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    fn record(&self, call: FacadeCall) -> MessageResponseDto {
        lock(&self.calls).push(call);
        fixtures::message_response("recorded-group")
    }
}

#[async_trait]
impl MessageFacade for RecordingFacade {
    async fn get_message_stream(
        &self,
        _credentials: &ChatCredentials,
        group_id: &str,
    ) -> ApiResult<MessageStreamDto> {
        lock(&self.calls).push(FacadeCall::GetMessageStream {
            group_id: group_id.to_string(),
        });
        Ok(lock(&self.stream)
            .clone()
            .unwrap_or_else(fixtures::empty_stream))
    }

    async fn post_group_message(
        &self,
        _credentials: &ChatCredentials,
        group_id: &str,
        message: MessageDto,
    ) -> ApiResult<MessageResponseDto> {
        Ok(self.record(FacadeCall::PostGroupMessage {
            group_id: group_id.to_string(),
            message,
        }))
    }

    async fn post_feedback_group_message(
        &self,
        _credentials: &ChatCredentials,
        feedback_group_id: &str,
        message: MessageDto,
    ) -> ApiResult<MessageResponseDto> {
        Ok(self.record(FacadeCall::PostFeedbackGroupMessage {
            feedback_group_id: feedback_group_id.to_string(),
            message,
        }))
    }

    async fn post_forward_message(
        &self,
        _credentials: &ChatCredentials,
        feedback_group_id: &str,
        message: ForwardMessageDto,
    ) -> ApiResult<MessageResponseDto> {
        Ok(self.record(FacadeCall::PostForwardMessage {
            feedback_group_id: feedback_group_id.to_string(),
            message,
        }))
    }

    async fn create_video_hint_message(
        &self,
        group_id: &str,
        video_call: VideoCallMessageDto,
    ) -> ApiResult<MessageResponseDto> {
        Ok(self.record(FacadeCall::CreateVideoHintMessage {
            group_id: group_id.to_string(),
            video_call,
        }))
    }

    async fn post_alias_only_message(
        &self,
        group_id: &str,
        alias_only: AliasOnlyMessageDto,
    ) -> ApiResult<MessageResponseDto> {
        Ok(self.record(FacadeCall::PostAliasOnlyMessage {
            group_id: group_id.to_string(),
            alias_only,
        }))
    }
}

/// [`MessageEncryption`] that records calls.
///
/// `encrypt` produces `enc.<secret>:<message reversed>` so tests can tell
/// ciphertext from plaintext without real cryptography.
#[derive(Debug)]
pub struct RecordingEncryption {
    encrypt_calls: AtomicUsize,
    key_updates: Mutex<Vec<String>>,
    key_changes: AtomicBool,
}

impl Default for RecordingEncryption {
    fn default() -> Self {
        Self {
            encrypt_calls: AtomicUsize::new(0),
            key_updates: Mutex::new(Vec::new()),
            key_changes: AtomicBool::new(true),
        }
    }
}

impl RecordingEncryption {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `update_master_key` report an unchanged key.
    pub fn rejecting_key_updates(self) -> Self {
        self.key_changes.store(false, Ordering::SeqCst);
        self
    }

    pub fn encrypt_count(&self) -> usize {
        self.encrypt_calls.load(Ordering::SeqCst)
    }

    pub fn key_updates(&self) -> Vec<String> {
        lock(&self.key_updates).clone()
    }
}

impl MessageEncryption for RecordingEncryption {
    fn encrypt(&self, message: &str, secret: &str) -> ApiResult<String> {
        self.encrypt_calls.fetch_add(1, Ordering::SeqCst);
        let reversed: String = message.chars().rev().collect();
        Ok(format!("{}{}:{}", ENCRYPTED_PREFIX, secret, reversed))
    }

    fn decrypt(&self, message: &str, secret: &str) -> ApiResult<String> {
        let Some(body) = message.strip_prefix(ENCRYPTED_PREFIX) else {
            return Ok(message.to_string());
        };
        match body.split_once(':') {
            Some((used_secret, reversed)) if used_secret == secret => {
                Ok(reversed.chars().rev().collect())
            }
            _ => Err(ApiError::encryption_failed("Wrong secret")),
        }
    }

    fn update_master_key(&self, master_key: &str) -> ApiResult<bool> {
        lock(&self.key_updates).push(master_key.to_string());
        Ok(self.key_changes.load(Ordering::SeqCst))
    }
}

/// [`ChatBackend`] that records posted messages.
#[derive(Debug)]
pub struct RecordingChatBackend {
    posted: Mutex<Vec<(ChatCredentials, PostMessageRequest)>>,
    stream: Mutex<MessageStreamDto>,
    system_logins: AtomicUsize,
    healthy: AtomicBool,
}

impl Default for RecordingChatBackend {
    fn default() -> Self {
        Self {
            posted: Mutex::new(Vec::new()),
            stream: Mutex::new(fixtures::empty_stream()),
            system_logins: AtomicUsize::new(0),
            healthy: AtomicBool::new(true),
        }
    }
}

impl RecordingChatBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stream(self, stream: MessageStreamDto) -> Self {
        *lock(&self.stream) = stream;
        self
    }

    /// Make `ping` fail.
    pub fn unhealthy(self) -> Self {
        self.healthy.store(false, Ordering::SeqCst);
        self
    }

    pub fn posted(&self) -> Vec<(ChatCredentials, PostMessageRequest)> {
        lock(&self.posted).clone()
    }

    pub fn system_logins(&self) -> usize {
        self.system_logins.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatBackend for RecordingChatBackend {
    async fn group_messages(
        &self,
        _credentials: &ChatCredentials,
        _group_id: &str,
    ) -> ApiResult<MessageStreamDto> {
        Ok(lock(&self.stream).clone())
    }

    async fn post_group_message(
        &self,
        credentials: &ChatCredentials,
        request: &PostMessageRequest,
    ) -> ApiResult<MessageResponseDto> {
        lock(&self.posted).push((credentials.clone(), request.clone()));
        Ok(fixtures::message_response(&request.room_id))
    }

    async fn system_credentials(&self) -> ApiResult<ChatCredentials> {
        self.system_logins.fetch_add(1, Ordering::SeqCst);
        Ok(ChatCredentials::new(
            fixtures::SYSTEM_USER_ID,
            "system-auth-token",
        ))
    }

    async fn ping(&self) -> ApiResult<()> {
        if self.healthy.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ApiError::chat_backend("Chat backend unreachable"))
        }
    }
}

/// [`TenantResolver`] that records the URI of every request it sees.
#[derive(Debug)]
pub struct RecordingTenantResolver {
    tenant_id: TenantId,
    uris: Mutex<Vec<String>>,
}

impl RecordingTenantResolver {
    pub fn new(tenant_id: TenantId) -> Self {
        Self {
            tenant_id,
            uris: Mutex::new(Vec::new()),
        }
    }

    pub fn resolved_uris(&self) -> Vec<String> {
        lock(&self.uris).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.uris).len()
    }
}

impl TenantResolver for RecordingTenantResolver {
    fn resolve(&self, request: &Request) -> ApiResult<TenantId> {
        lock(&self.uris).push(request.uri().to_string());
        Ok(self.tenant_id)
    }
}

/// Notification recorded by [`RecordingNotifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    NewMessage(String),
    NewFeedbackMessage(String),
}

/// [`MessageNotifier`] that records notifications.
///
/// Notifications are spawned by the facade, so tests wait for them with
/// [`RecordingNotifier::wait_for`].
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notifications: Mutex<Vec<Notification>>,
    notify: Notify,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        lock(&self.notifications).clone()
    }

    /// Wait until at least `count` notifications arrived. Returns `false` on
    /// timeout.
    pub async fn wait_for(&self, count: usize, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if lock(&self.notifications).len() >= count {
                return true;
            }
            if tokio::time::timeout_at(deadline, self.notify.notified())
                .await
                .is_err()
            {
                return lock(&self.notifications).len() >= count;
            }
        }
    }

    fn record(&self, notification: Notification) {
        lock(&self.notifications).push(notification);
        self.notify.notify_one();
    }
}

#[async_trait]
impl MessageNotifier for RecordingNotifier {
    async fn new_message(&self, group_id: &str) {
        self.record(Notification::NewMessage(group_id.to_string()));
    }

    async fn new_feedback_message(&self, group_id: &str) {
        self.record(Notification::NewFeedbackMessage(group_id.to_string()));
    }
}

// ============================================================================
// GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for the relay DTOs.

    use super::*;
    use proptest::prelude::*;

    /// Non-blank text, including umlauts and punctuation.
    pub fn arb_text() -> impl Strategy<Value = String> {
        "[a-zA-Z0-9äöüßÄÖÜ .,!?-]{0,40}[a-zA-Z0-9äöüß]"
    }

    /// A chat group id in RocketChat's 17-character format.
    pub fn arb_group_id() -> impl Strategy<Value = String> {
        "[a-zA-Z0-9]{17}"
    }

    pub fn arb_authority() -> impl Strategy<Value = Authority> {
        prop::sample::select(Authority::ALL.to_vec())
    }

    pub fn arb_message_type() -> impl Strategy<Value = MessageType> {
        prop::sample::select(MessageType::ALL.to_vec())
    }

    pub fn arb_message_dto() -> impl Strategy<Value = MessageDto> {
        (arb_text(), prop::option::of(Just("e2e".to_string())), any::<bool>()).prop_map(
            |(message, t, send_notification)| MessageDto {
                message,
                t,
                send_notification,
            },
        )
    }

    pub fn arb_forward_message_dto() -> impl Strategy<Value = ForwardMessageDto> {
        (
            arb_text(),
            (1577836800i64..1893456000i64),
            "[a-z]{3,12}",
            arb_group_id(),
        )
            .prop_map(|(message, secs, username, rc_user_id)| ForwardMessageDto {
                message,
                timestamp: secs.to_string(),
                username,
                rc_user_id,
            })
    }

    pub fn arb_video_call_message_dto() -> impl Strategy<Value = VideoCallMessageDto> {
        ("[a-z]{3,12}", arb_group_id()).prop_map(|(initiator_user_name, initiator_rc_user_id)| {
            VideoCallMessageDto {
                event_type: VideoCallEventType::IgnoredCall,
                initiator_user_name,
                initiator_rc_user_id,
            }
        })
    }

    pub fn arb_alias_only_message_dto() -> impl Strategy<Value = AliasOnlyMessageDto> {
        arb_message_type().prop_map(|message_type| AliasOnlyMessageDto { message_type })
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built values for common testing scenarios.

    use super::*;
    use relay_api::{encode_jwt_token, AuthConfig, Claims};

    /// Signing secret used by test routers.
    pub const TEST_JWT_SECRET: &str = "relay-test-secret-that-is-long-enough-for-prod";

    pub const CSRF_COOKIE: &str = "CSRF-TOKEN";
    pub const CSRF_HEADER: &str = "X-CSRF-TOKEN";
    pub const CSRF_VALUE: &str = "test-csrf-value";

    pub const RC_TOKEN: &str = "rc-auth-token";
    pub const RC_USER_ID: &str = "rc-user-id";
    pub const RC_GROUP_ID: &str = "GROUPxyz12345abcd";
    pub const RC_FEEDBACK_GROUP_ID: &str = "FEEDBACKxyz123456";
    pub const SYSTEM_USER_ID: &str = "rc-system-user";

    pub fn auth_config() -> AuthConfig {
        AuthConfig::with_secret(TEST_JWT_SECRET)
    }

    /// Bearer header value for a user holding exactly `authorities`.
    pub fn bearer_with_authorities(config: &AuthConfig, authorities: &[Authority]) -> String {
        let claims = Claims::new("test-user", 3600, &*config.clock)
            .with_username("test-user")
            .with_authorities(authorities.iter().copied());
        bearer(config, &claims)
    }

    /// Bearer header value for a user with the given realm roles.
    pub fn bearer_with_roles(config: &AuthConfig, roles: &[Role]) -> String {
        let claims = Claims::new("test-user", 3600, &*config.clock)
            .with_roles(roles.iter().map(|r| r.as_str()));
        bearer(config, &claims)
    }

    pub fn bearer(config: &AuthConfig, claims: &Claims) -> String {
        match encode_jwt_token(config, claims) {
            Ok(token) => format!("Bearer {}", token),
            Err(e) => panic!("test token could not be signed: {}", e),
        }
    }

    /// `Cookie` header value carrying the CSRF token.
    pub fn csrf_cookie() -> String {
        format!("{}={}", CSRF_COOKIE, CSRF_VALUE)
    }

    pub fn empty_stream() -> MessageStreamDto {
        MessageStreamDto {
            messages: Vec::new(),
            count: 0,
            offset: 0,
            total: 0,
            success: true,
        }
    }

    pub fn chat_message(group_id: &str, id: &str, msg: &str) -> ChatMessage {
        ChatMessage {
            id: id.to_string(),
            rid: group_id.to_string(),
            msg: msg.to_string(),
            ts: "2024-01-01T10:00:00.000Z".to_string(),
            alias: None,
            u: ChatUser {
                id: RC_USER_ID.to_string(),
                username: "test-user".to_string(),
                name: None,
            },
            t: None,
            updated_at: None,
        }
    }

    pub fn stream_of(messages: Vec<ChatMessage>) -> MessageStreamDto {
        let count = messages.len() as u32;
        MessageStreamDto {
            messages,
            count,
            offset: 0,
            total: count,
            success: true,
        }
    }

    pub fn message_response(group_id: &str) -> MessageResponseDto {
        MessageResponseDto {
            id: "recorded-message".to_string(),
            rid: group_id.to_string(),
            ts: "2024-01-01T10:00:00.000Z".to_string(),
        }
    }

    pub fn message_dto(text: &str) -> MessageDto {
        MessageDto {
            message: text.to_string(),
            t: None,
            send_notification: false,
        }
    }

    pub fn forward_message_dto() -> ForwardMessageDto {
        ForwardMessageDto {
            message: "Nachricht zur Weiterleitung".to_string(),
            timestamp: "2024-01-01T09:00:00Z".to_string(),
            username: "asker".to_string(),
            rc_user_id: "rc-asker".to_string(),
        }
    }

    pub fn video_call_message_dto() -> VideoCallMessageDto {
        VideoCallMessageDto {
            event_type: VideoCallEventType::IgnoredCall,
            initiator_user_name: "consultant".to_string(),
            initiator_rc_user_id: "rc-consultant".to_string(),
        }
    }
}

// ============================================================================
// ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions on API results and error bodies.

    use relay_api::{ApiError, ApiResult, ErrorCode};

    /// Assert that an [`ApiResult`] failed with `code`.
    #[track_caller]
    pub fn assert_error_code<T: std::fmt::Debug>(result: &ApiResult<T>, code: ErrorCode) {
        match result {
            Err(err) => assert_eq!(err.code, code, "unexpected error: {}", err),
            Ok(value) => panic!("Expected {:?}, got Ok({:?})", code, value),
        }
    }

    /// Assert that a JSON response body is an [`ApiError`] with `code`.
    #[track_caller]
    pub fn assert_error_body(body: &[u8], code: ErrorCode) {
        match serde_json::from_slice::<ApiError>(body) {
            Ok(err) => assert_eq!(err.code, code, "unexpected error: {}", err),
            Err(e) => panic!(
                "Body is not an ApiError ({}): {}",
                e,
                String::from_utf8_lossy(body)
            ),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use relay_core::Validate;

    #[test]
    fn test_recording_encryption_round_trip() -> ApiResult<()> {
        let encryption = RecordingEncryption::new();
        let encrypted = encryption.encrypt("hallo", "G1")?;
        assert_ne!(encrypted, "hallo");
        assert_eq!(encryption.decrypt(&encrypted, "G1")?, "hallo");
        assertions::assert_error_code(
            &encryption.decrypt(&encrypted, "G2"),
            relay_api::ErrorCode::EncryptionFailed,
        );
        assert_eq!(encryption.encrypt_count(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_unhealthy_backend_fails_ping() {
        let chat = RecordingChatBackend::new().unhealthy();
        assertions::assert_error_code(&chat.ping().await, relay_api::ErrorCode::ChatBackendError);
    }

    #[test]
    fn test_bearer_fixture_authenticates() -> ApiResult<()> {
        let config = fixtures::auth_config();
        let header = fixtures::bearer_with_authorities(&config, &[Authority::UseFeedback]);
        let context = relay_api::authenticate(&config, Some(header.as_str()))?;
        assert!(context.has_authority(Authority::UseFeedback));
        assert!(!context.has_authority(Authority::UserDefault));
        Ok(())
    }

    #[tokio::test]
    async fn test_notifier_wait_for() {
        let notifier = std::sync::Arc::new(RecordingNotifier::new());
        let background = notifier.clone();
        tokio::spawn(async move {
            background.new_message("G1").await;
        });
        assert!(notifier.wait_for(1, Duration::from_secs(2)).await);
        assert_eq!(
            notifier.notifications(),
            vec![Notification::NewMessage("G1".to_string())]
        );
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn prop_generated_messages_are_valid(dto in generators::arb_message_dto()) {
            prop_assert!(dto.validate().is_ok());
        }

        #[test]
        fn prop_generated_forward_messages_are_valid(dto in generators::arb_forward_message_dto()) {
            prop_assert!(dto.validate().is_ok());
        }

        #[test]
        fn prop_generated_video_calls_are_valid(dto in generators::arb_video_call_message_dto()) {
            prop_assert!(dto.validate().is_ok());
        }
    }
}
