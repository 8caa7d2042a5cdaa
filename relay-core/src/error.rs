//! Error types for relay operations

use thiserror::Error;

/// Validation errors raised by DTO checks.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Errors while building or reading a chat message alias.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AliasError {
    #[error("Failed to serialize alias: {reason}")]
    Serialize { reason: String },

    #[error("Failed to decode alias: {reason}")]
    Decode { reason: String },
}

/// Master error type for all relay-core errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RelayError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Alias(#[from] AliasError),
}

/// Result type for relay-core operations.
pub type RelayResult<T> = Result<T, RelayError>;
