//! Streaming chat client for the model assistant
//!
//! The service answers `POST /chat-messages` with a newline-delimited stream of JSON
//! messages, optionally framed as server-sent events (`data: {...}`).

use std::time::{SystemTime, UNIX_EPOCH};

use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use crate::config::AssistantConfig;
use crate::error::{ApiError, Result};

/// One streamed chunk of an assistant answer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantMessage {
    pub event: String,
    pub conversation_id: String,
    pub message_id: String,
    pub created_at: u64,
    pub task_id: String,
    pub id: String,
    pub answer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_variable_selector: Option<Vec<String>>,
}

/// Decode one stream line; blank lines and end markers yield `None`
pub fn parse_stream_line(line: &str) -> Option<AssistantMessage> {
    let line = line.trim();
    let payload = line.strip_prefix("data:").map(str::trim).unwrap_or(line);
    if payload.is_empty() || payload == "[DONE]" {
        return None;
    }
    match serde_json::from_str(payload) {
        Ok(message) => Some(message),
        Err(e) => {
            warn!("Failed to parse message: {}", e);
            None
        }
    }
}

pub struct AssistantClient {
    config: AssistantConfig,
    http: Client,
}

impl AssistantClient {
    pub fn new(config: AssistantConfig) -> Self {
        Self {
            config,
            http: Client::new(),
        }
    }

    /// Ask `query`, handing every decoded chunk to `on_message` as it arrives.
    ///
    /// An empty `conversation_id` starts a new conversation.
    pub async fn send_message<F>(
        &self,
        query: &str,
        conversation_id: Option<&str>,
        mut on_message: F,
    ) -> Result<()>
    where
        F: FnMut(AssistantMessage),
    {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or(ApiError::MissingApiKey("assistant"))?;

        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        let body = json!({
            "inputs": {},
            "query": query,
            "response_mode": "streaming",
            "conversation_id": conversation_id.unwrap_or_default(),
            "user": format!("user-{}", millis),
        });

        let url = format!("{}/chat-messages", self.config.base_url.trim_end_matches('/'));
        debug!("Sending assistant query to {}", url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let mut stream = response.bytes_stream();
        let mut buffer: Vec<u8> = Vec::new();
        while let Some(chunk) = stream.next().await {
            buffer.extend_from_slice(&chunk?);
            while let Some(newline) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=newline).collect();
                if let Some(message) = parse_stream_line(&String::from_utf8_lossy(&line)) {
                    on_message(message);
                }
            }
        }
        if let Some(message) = parse_stream_line(&String::from_utf8_lossy(&buffer)) {
            on_message(message);
        }
        Ok(())
    }
}
