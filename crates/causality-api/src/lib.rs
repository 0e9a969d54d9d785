//! Causality API
//!
//! HTTP clients used by the governance client: [`EventApiClient`] for the event index
//! (publishing, queries and the per-user and per-subspace aggregates) and
//! [`AssistantClient`] for the streaming model assistant.

pub mod assistant;
pub mod client;
pub mod config;
pub mod error;

pub use assistant::{AssistantClient, AssistantMessage};
pub use client::{EventApiClient, EventQuery};
pub use config::{ApiConfig, AssistantConfig, DEFAULT_API_BASE_URL};
pub use error::{ApiError, Result};

/// Re-exported for callers of [`EventApiClient::fetch_with_retry`]
pub use reqwest::Method;
