//! API Configuration Module
//!
//! Configuration for the relay service. Each concern has its own struct with
//! a `from_env()` constructor; [`RelayConfig`] bundles them for startup.

use crate::auth::AuthConfig;
use crate::error::{ApiError, ApiResult};
use secrecy::{ExposeSecret, SecretString};

/// True when `RELAY_ENVIRONMENT` is `production` or `prod`.
pub fn is_production_environment() -> bool {
    let environment = std::env::var("RELAY_ENVIRONMENT")
        .unwrap_or_else(|_| "development".to_string())
        .to_lowercase();
    environment == "production" || environment == "prod"
}

fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}

fn env_list(key: &str) -> Vec<String> {
    std::env::var(key)
        .ok()
        .map(|s| {
            s.split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

// ============================================================================
// CORS
// ============================================================================

/// CORS settings.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Allowed CORS origins. Empty means allow all origins (dev mode).
    pub cors_origins: Vec<String>,

    /// Whether to allow credentials in CORS requests.
    pub cors_allow_credentials: bool,

    /// Max age for CORS preflight cache in seconds.
    pub cors_max_age_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            cors_origins: Vec::new(),
            cors_allow_credentials: false,
            cors_max_age_secs: 86400,
        }
    }
}

impl ApiConfig {
    /// Environment variables:
    /// - `RELAY_CORS_ORIGINS`: comma-separated allowed origins (empty = allow all)
    /// - `RELAY_CORS_ALLOW_CREDENTIALS`: "true" or "false" (default: false)
    /// - `RELAY_CORS_MAX_AGE_SECS`: preflight cache duration (default: 86400)
    pub fn from_env() -> Self {
        Self {
            cors_origins: env_list("RELAY_CORS_ORIGINS"),
            cors_allow_credentials: env_bool("RELAY_CORS_ALLOW_CREDENTIALS", false),
            cors_max_age_secs: std::env::var("RELAY_CORS_MAX_AGE_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(86400),
        }
    }

    /// Strict CORS is in effect once origins are configured.
    pub fn is_production(&self) -> bool {
        !self.cors_origins.is_empty()
    }

    /// Check if a given origin is allowed.
    pub fn is_origin_allowed(&self, origin: &str) -> bool {
        if self.cors_origins.is_empty() {
            return true;
        }

        self.cors_origins.iter().any(|allowed| {
            if allowed == origin {
                return true;
            }
            // Wildcard subdomains: *.example.org
            if let Some(pattern) = allowed.strip_prefix("*.") {
                if let Some(origin_domain) = origin.strip_prefix("https://") {
                    return origin_domain.ends_with(&format!(".{}", pattern))
                        || origin_domain == pattern;
                }
            }
            false
        })
    }
}

// ============================================================================
// CSRF
// ============================================================================

/// Double-submit CSRF settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsrfConfig {
    pub cookie_name: String,
    pub header_name: String,
    /// Path patterns exempt from the check (`/**` suffix matches a subtree).
    pub allowed_paths: Vec<String>,
}

impl Default for CsrfConfig {
    fn default() -> Self {
        Self {
            cookie_name: "CSRF-TOKEN".to_string(),
            header_name: "X-CSRF-TOKEN".to_string(),
            allowed_paths: Vec::new(),
        }
    }
}

impl CsrfConfig {
    /// Environment variables:
    /// - `RELAY_CSRF_COOKIE` (default: `CSRF-TOKEN`)
    /// - `RELAY_CSRF_HEADER` (default: `X-CSRF-TOKEN`)
    /// - `RELAY_CSRF_ALLOWED_PATHS`: comma-separated exempt path patterns
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            cookie_name: env_non_empty("RELAY_CSRF_COOKIE").unwrap_or(defaults.cookie_name),
            header_name: env_non_empty("RELAY_CSRF_HEADER").unwrap_or(defaults.header_name),
            allowed_paths: env_list("RELAY_CSRF_ALLOWED_PATHS"),
        }
    }
}

// ============================================================================
// ROCKETCHAT
// ============================================================================

/// Chat backend connection settings.
#[derive(Clone)]
pub struct RocketChatConfig {
    pub base_url: String,
    pub system_username: String,
    pub system_password: SecretString,
    pub timeout_secs: u64,
}

impl std::fmt::Debug for RocketChatConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RocketChatConfig")
            .field("base_url", &self.base_url)
            .field("system_username", &self.system_username)
            .field("system_password", &"[REDACTED]")
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl Default for RocketChatConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            system_username: "system".to_string(),
            system_password: SecretString::new(String::new().into()),
            timeout_secs: 10,
        }
    }
}

impl RocketChatConfig {
    /// Environment variables:
    /// - `RELAY_ROCKETCHAT_URL` (default: `http://localhost:3000`)
    /// - `RELAY_ROCKETCHAT_SYSTEM_USERNAME` (default: `system`)
    /// - `RELAY_ROCKETCHAT_SYSTEM_PASSWORD`
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: env_non_empty("RELAY_ROCKETCHAT_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.base_url),
            system_username: env_non_empty("RELAY_ROCKETCHAT_SYSTEM_USERNAME")
                .unwrap_or(defaults.system_username),
            system_password: env_non_empty("RELAY_ROCKETCHAT_SYSTEM_PASSWORD")
                .map(|p| SecretString::new(p.into()))
                .unwrap_or(defaults.system_password),
            timeout_secs: defaults.timeout_secs,
        }
    }
}

// ============================================================================
// AGGREGATE
// ============================================================================

/// Everything the binary needs to assemble the service.
#[derive(Clone)]
pub struct RelayConfig {
    pub api: ApiConfig,
    pub auth: AuthConfig,
    pub csrf: CsrfConfig,
    pub rocketchat: RocketChatConfig,
    pub master_key: Option<SecretString>,
    pub user_service_url: Option<String>,
    pub multitenancy_enabled: bool,
}

impl std::fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayConfig")
            .field("api", &self.api)
            .field("auth", &self.auth)
            .field("csrf", &self.csrf)
            .field("rocketchat", &self.rocketchat)
            .field("master_key", &self.master_key.as_ref().map(|_| "[REDACTED]"))
            .field("user_service_url", &self.user_service_url)
            .field("multitenancy_enabled", &self.multitenancy_enabled)
            .finish()
    }
}

impl RelayConfig {
    /// Environment variables, in addition to those read by the nested configs:
    /// - `RELAY_MASTER_KEY`: initial encryption master key
    /// - `RELAY_USER_SERVICE_URL`: base URL of the mail notification service
    /// - `RELAY_MULTITENANCY_ENABLED`: install the tenant filter (default: false)
    pub fn from_env() -> Self {
        Self {
            api: ApiConfig::from_env(),
            auth: AuthConfig::from_env(),
            csrf: CsrfConfig::from_env(),
            rocketchat: RocketChatConfig::from_env(),
            master_key: env_non_empty("RELAY_MASTER_KEY").map(|k| SecretString::new(k.into())),
            user_service_url: env_non_empty("RELAY_USER_SERVICE_URL")
                .map(|url| url.trim_end_matches('/').to_string()),
            multitenancy_enabled: env_bool("RELAY_MULTITENANCY_ENABLED", false),
        }
    }

    /// Startup checks. Fails in production on an insecure JWT secret or a
    /// missing master key.
    pub fn validate_for_production(&self) -> ApiResult<()> {
        self.auth.validate_for_production()?;

        let has_master_key = self
            .master_key
            .as_ref()
            .is_some_and(|k| !k.expose_secret().is_empty());

        if !has_master_key {
            if is_production_environment() {
                return Err(ApiError::invalid_input(
                    "Cannot start in production without RELAY_MASTER_KEY",
                ));
            }
            tracing::warn!(
                "No RELAY_MASTER_KEY set; message endpoints answer 503 \
                 until a key is posted to /messages/key"
            );
        }

        Ok(())
    }
}
