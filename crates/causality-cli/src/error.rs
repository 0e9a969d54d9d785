//! Error handling for the Causality CLI

use thiserror::Error;

use crate::config::ConfigError;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    #[error("{0}")]
    Core(#[from] causality_core::CoreError),

    #[error("Relay error: {0}")]
    Nostr(#[from] causality_nostr::NostrError),

    #[error("Event index error: {0}")]
    Api(#[from] causality_api::ApiError),

    #[error(transparent)]
    ConfigFile(#[from] ConfigError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No signing key configured; run `causality wallet new --save` or set CAUSALITY_WALLET__SECRET_KEY")]
    WalletNotConfigured,

    #[error("Invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    #[error("{0} not found")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CliError {
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        CliError::Validation {
            field,
            reason: reason.into(),
        }
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
