//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid port number")]
    InvalidPort,

    #[error("Invalid request timeout")]
    InvalidTimeout,

    #[error("Invalid model deadline: {0}")]
    InvalidDeadline(&'static str),

    #[error("Invalid database URL format")]
    InvalidDatabaseUrl,

    #[error("Invalid Redis URL format")]
    InvalidRedisUrl,

    #[error("Pool min_connections exceeds max_connections")]
    InvalidPoolSize,

    #[error("Pool size exceeds maximum allowed (100)")]
    PoolSizeTooLarge,

    #[error("Archive table must be a plain SQL identifier")]
    InvalidArchiveTable,

    #[error("Invalid URL for {0}")]
    InvalidUrl(&'static str),

    #[error("Callback base URL must use HTTPS in production")]
    CallbackBaseMustBeHttps,

    #[error("Queue max_attempts must be at least 1")]
    InvalidMaxAttempts,

    #[error("Queue max_in_flight must be at least 1")]
    InvalidMaxInFlight,
}
