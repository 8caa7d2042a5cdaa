#![allow(dead_code)]

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, Response};
use axum::Router;
use relay_api::{
    ApiConfig, AppState, CsrfConfig, MessageEncryption, MessageFacade, RelayMessageFacade,
    SecureRouterBuilder, TenantFilterState, TenantResolver,
};
use relay_test_utils::fixtures::{self, CSRF_HEADER, CSRF_VALUE, RC_TOKEN, RC_USER_ID};
use relay_test_utils::{
    RecordingChatBackend, RecordingEncryption, RecordingFacade, RecordingNotifier,
};

/// Router over recording fakes. The facade is the recording one, so tests
/// can count how often each endpoint reached it.
pub struct TestApp {
    pub router: Router,
    pub facade: Arc<RecordingFacade>,
    pub encryption: Arc<RecordingEncryption>,
    pub chat: Arc<RecordingChatBackend>,
}

pub fn test_app() -> TestApp {
    build(RecordingFacade::new(), RecordingEncryption::new(), None)
}

pub fn test_app_with_facade(facade: RecordingFacade) -> TestApp {
    build(facade, RecordingEncryption::new(), None)
}

pub fn test_app_with_encryption(encryption: RecordingEncryption) -> TestApp {
    build(RecordingFacade::new(), encryption, None)
}

pub fn test_app_with_tenant_resolver(resolver: Arc<dyn TenantResolver>) -> TestApp {
    test_app_with_tenant_filter(TenantFilterState::new(resolver))
}

pub fn test_app_with_tenant_filter(tenant_filter: TenantFilterState) -> TestApp {
    build(
        RecordingFacade::new(),
        RecordingEncryption::new(),
        Some(tenant_filter),
    )
}

fn build(
    facade: RecordingFacade,
    encryption: RecordingEncryption,
    tenant_filter: Option<TenantFilterState>,
) -> TestApp {
    let facade = Arc::new(facade);
    let encryption = Arc::new(encryption);
    let chat = Arc::new(RecordingChatBackend::new());

    let state = AppState::new(
        facade.clone() as Arc<dyn MessageFacade>,
        encryption.clone() as Arc<dyn MessageEncryption>,
        chat.clone(),
    );
    let builder = match SecureRouterBuilder::new(
        state,
        ApiConfig::default(),
        fixtures::auth_config(),
        CsrfConfig::default(),
    ) {
        Ok(builder) => builder,
        Err(e) => panic!("Failed to build router: {}", e),
    };
    let builder = match tenant_filter {
        Some(tenant_filter) => builder.with_tenant_filter(tenant_filter),
        None => builder,
    };

    TestApp {
        router: builder.build(),
        facade,
        encryption,
        chat,
    }
}

/// Router whose facade is the real one, wired to recording collaborators.
pub struct RelayApp {
    pub router: Router,
    pub chat: Arc<RecordingChatBackend>,
    pub notifier: Arc<RecordingNotifier>,
}

pub fn relay_app(chat: RecordingChatBackend) -> RelayApp {
    relay_app_with_encryption(chat, Arc::new(RecordingEncryption::new()))
}

pub fn relay_app_with_encryption(
    chat: RecordingChatBackend,
    encryption: Arc<dyn MessageEncryption>,
) -> RelayApp {
    let chat = Arc::new(chat);
    let notifier = Arc::new(RecordingNotifier::new());
    let facade = Arc::new(RelayMessageFacade::new(
        chat.clone(),
        encryption.clone(),
        notifier.clone(),
    ));

    let state = AppState::new(facade, encryption, chat.clone());
    let router = match SecureRouterBuilder::new(
        state,
        ApiConfig::default(),
        fixtures::auth_config(),
        CsrfConfig::default(),
    ) {
        Ok(builder) => builder.build(),
        Err(e) => panic!("Failed to build router: {}", e),
    };

    RelayApp {
        router,
        chat,
        notifier,
    }
}

/// Request with chat headers, the group headers and, optionally, a bearer
/// token and a matching CSRF pair.
pub struct RequestSpec<'a> {
    pub method: Method,
    pub path: &'a str,
    pub bearer: Option<String>,
    pub csrf: bool,
    pub body: Option<serde_json::Value>,
}

impl<'a> RequestSpec<'a> {
    pub fn new(method: Method, path: &'a str) -> Self {
        Self {
            method,
            path,
            bearer: None,
            csrf: true,
            body: None,
        }
    }

    pub fn bearer(mut self, bearer: String) -> Self {
        self.bearer = Some(bearer);
        self
    }

    pub fn without_csrf(mut self) -> Self {
        self.csrf = false;
        self
    }

    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn build(self) -> Request<Body> {
        let mut builder = Request::builder()
            .method(self.method)
            .uri(self.path)
            .header("RCToken", RC_TOKEN)
            .header("RCUserId", RC_USER_ID)
            .header("RCGroupId", fixtures::RC_GROUP_ID)
            .header("RCFeedbackGroupId", fixtures::RC_FEEDBACK_GROUP_ID);

        if let Some(bearer) = self.bearer {
            builder = builder.header("authorization", bearer);
        }
        if self.csrf {
            builder = builder
                .header("cookie", fixtures::csrf_cookie())
                .header(CSRF_HEADER, CSRF_VALUE);
        }

        let body = match self.body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        match builder.body(body) {
            Ok(request) => request,
            Err(e) => panic!("Failed to build request: {}", e),
        }
    }
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    match to_bytes(response.into_body(), usize::MAX).await {
        Ok(bytes) => bytes.to_vec(),
        Err(e) => panic!("Failed to read body: {}", e),
    }
}
