//! Error types for the Causality core
//!
//! Every fallible operation in this crate returns [`CoreError`]. The variants fall into
//! the three groups the client surfaces to users: malformed input caught before any
//! network call, signature problems, and data that could not be decoded.

use thiserror::Error;

// ----------------------------------------------------------------------------
// Error Types
// ----------------------------------------------------------------------------

/// Core error type shared by builders, wallet crypto and aggregation
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid operations list '{ops}': {reason}")]
    InvalidOps { ops: String, reason: String },

    #[error("Invalid subspace id: {0}")]
    InvalidSubspaceId(String),

    #[error("Unknown event kind: {0}")]
    UnknownKind(u16),

    #[error("Value out of range for {field}: {value}")]
    OutOfRange { field: &'static str, value: String },

    #[error("Invalid signature: {0}")]
    Signature(String),

    #[error("Signature was produced by {recovered}, expected {expected}")]
    SignatureMismatch { expected: String, recovered: String },

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Hex decoding error: {0}")]
    HexDecoding(#[from] hex::FromHexError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<k256::ecdsa::Error> for CoreError {
    fn from(err: k256::ecdsa::Error) -> Self {
        CoreError::Signature(err.to_string())
    }
}

/// Result type for core operations
pub type Result<T> = core::result::Result<T, CoreError>;
