//! Relay API Server Entry Point
//!
//! Reads configuration from the environment, wires the chat backend client,
//! encryption service and notifier, and starts the Axum HTTP server.

use std::net::SocketAddr;
use std::sync::Arc;

use relay_api::telemetry::{init_tracing, TelemetryConfig};
use relay_api::{
    AesEncryptionService, ApiError, ApiResult, AppState, ChatBackend, MessageEncryption,
    MessageFacade, MessageNotifier, NoopNotifier, RelayConfig, RelayMessageFacade,
    RocketChatClient, SecureRouterBuilder, UserServiceNotifier,
};

#[tokio::main]
async fn main() -> ApiResult<()> {
    let telemetry_config = TelemetryConfig::default();
    init_tracing(&telemetry_config)?;

    let config = RelayConfig::from_env();
    config.validate_for_production()?;
    tracing::debug!(?config, "Configuration loaded");

    let chat: Arc<dyn ChatBackend> = Arc::new(RocketChatClient::new(config.rocketchat.clone())?);

    let encryption: Arc<dyn MessageEncryption> = match config.master_key.clone() {
        Some(master_key) => Arc::new(AesEncryptionService::new(master_key)),
        None => Arc::new(AesEncryptionService::without_key()),
    };

    let notifier: Arc<dyn MessageNotifier> = match &config.user_service_url {
        Some(url) => Arc::new(UserServiceNotifier::new(url.as_str())?),
        None => Arc::new(NoopNotifier),
    };

    let facade: Arc<dyn MessageFacade> = Arc::new(RelayMessageFacade::new(
        chat.clone(),
        encryption.clone(),
        notifier,
    ));

    let state = AppState::new(facade, encryption, chat);
    let app = SecureRouterBuilder::from_config(state, &config)?.build();

    let addr = resolve_bind_addr()?;
    tracing::info!(%addr, "Starting relay API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => {
            result.map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}

fn resolve_bind_addr() -> ApiResult<SocketAddr> {
    let host = std::env::var("RELAY_API_BIND").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port_str = std::env::var("PORT")
        .ok()
        .or_else(|| std::env::var("RELAY_API_PORT").ok())
        .unwrap_or_else(|| "8080".to_string());
    let port = port_str
        .parse::<u16>()
        .map_err(|_| ApiError::invalid_input(format!("Invalid port value: {}", port_str)))?;

    let addr = format!("{}:{}", host, port);
    addr.parse::<SocketAddr>()
        .map_err(|e| ApiError::invalid_input(format!("Invalid bind address {}: {}", addr, e)))
}
