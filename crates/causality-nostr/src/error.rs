//! Error types for relay publishing

use causality_core::{CoreError, EventKind};
use thiserror::Error;

// ----------------------------------------------------------------------------
// Error Types
// ----------------------------------------------------------------------------

/// Errors raised while building, signing or publishing events
#[derive(Error, Debug)]
pub enum NostrError {
    #[error("Relay not set")]
    RelayNotSet,

    #[error("Wallet returned an empty signature")]
    EmptySignature,

    #[error("Invalid relay URL: {url}")]
    InvalidRelayUrl { url: String },

    #[error("Failed to connect to relay: {relay} - {reason}")]
    RelayConnectionFailed { relay: String, reason: String },

    #[error("Failed to send to relay: {0}")]
    SendFailed(String),

    #[error("Relay rejected event {event_id}: {message}")]
    Rejected { event_id: String, message: String },

    #[error("Timed out after {seconds}s waiting for {waiting_for}")]
    Timeout {
        waiting_for: &'static str,
        seconds: u64,
    },

    #[error("Relay connection closed")]
    ConnectionClosed,

    #[error("Invalid relay message: {0}")]
    InvalidMessage(String),

    #[error("Expected a {expected} event, got kind {actual}")]
    WrongKind { expected: EventKind, actual: u16 },

    #[error("Key operation failed: {0}")]
    KeyOperationFailed(String),

    #[error("Failed to build Nostr event: {0}")]
    NativeEvent(String),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<nostr_sdk::key::Error> for NostrError {
    fn from(err: nostr_sdk::key::Error) -> Self {
        NostrError::KeyOperationFailed(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for NostrError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        NostrError::SendFailed(err.to_string())
    }
}

/// Result type for relay operations
pub type Result<T> = core::result::Result<T, NostrError>;
