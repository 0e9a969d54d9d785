//! Error types for the HTTP clients

use thiserror::Error;

// ----------------------------------------------------------------------------
// Error Types
// ----------------------------------------------------------------------------

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("server unavailable")]
    ServerUnavailable,

    #[error("HTTP error! status: {status}")]
    Status { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("No API key configured for {0}")]
    MissingApiKey(&'static str),

    /// A failed operation, displayed as `"<action>: <cause>"`
    #[error("{action}: {source}")]
    Operation {
        action: String,
        #[source]
        source: Box<ApiError>,
    },
}

impl ApiError {
    /// Wrap this error with the action that failed
    pub fn context(self, action: impl Into<String>) -> Self {
        ApiError::Operation {
            action: action.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, below any `Operation` wrappers
    pub fn root_cause(&self) -> &ApiError {
        match self {
            ApiError::Operation { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// HTTP status of the underlying failure, if it was one
    pub fn status(&self) -> Option<u16> {
        match self.root_cause() {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

pub type Result<T> = core::result::Result<T, ApiError>;
