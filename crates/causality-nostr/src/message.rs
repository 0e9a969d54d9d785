//! NIP-01 relay messages
//!
//! The client sends `EVENT`, `REQ` and `CLOSE`; the relay answers with `EVENT`, `OK`,
//! `EOSE`, `CLOSED` and `NOTICE`. All messages are JSON arrays whose first element names
//! the message type.

use causality_core::Event;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{NostrError, Result};

// ----------------------------------------------------------------------------
// Filters
// ----------------------------------------------------------------------------

/// Subscription filter
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kinds: Option<Vec<u16>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub since: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub until: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kind(mut self, kind: u16) -> Self {
        self.kinds.get_or_insert_with(Vec::new).push(kind);
        self
    }

    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.authors.get_or_insert_with(Vec::new).push(author.into());
        self
    }

    pub fn since(mut self, since: u64) -> Self {
        self.since = Some(since);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

// ----------------------------------------------------------------------------
// Client Messages
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    /// `["EVENT", <event>]`
    Event(Box<Event>),
    /// `["REQ", <subscription_id>, <filter>...]`
    Req {
        subscription_id: String,
        filters: Vec<Filter>,
    },
    /// `["CLOSE", <subscription_id>]`
    Close { subscription_id: String },
}

impl ClientMessage {
    pub fn to_json(&self) -> Result<String> {
        let value = match self {
            ClientMessage::Event(event) => json!(["EVENT", event]),
            ClientMessage::Req {
                subscription_id,
                filters,
            } => {
                let mut items = vec![json!("REQ"), json!(subscription_id)];
                for filter in filters {
                    items.push(serde_json::to_value(filter)?);
                }
                Value::Array(items)
            }
            ClientMessage::Close { subscription_id } => json!(["CLOSE", subscription_id]),
        };
        Ok(value.to_string())
    }
}

// ----------------------------------------------------------------------------
// Relay Messages
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayMessage {
    /// `["EVENT", <subscription_id>, <event>]`
    Event {
        subscription_id: String,
        event: Box<Event>,
    },
    /// `["OK", <event_id>, <accepted>, <message>]`
    Ok {
        event_id: String,
        accepted: bool,
        message: String,
    },
    /// `["EOSE", <subscription_id>]`
    Eose { subscription_id: String },
    /// `["CLOSED", <subscription_id>, <message>]`
    Closed {
        subscription_id: String,
        message: String,
    },
    /// `["NOTICE", <message>]`
    Notice { message: String },
}

fn string_at(items: &[Value], index: usize, field: &str) -> Result<String> {
    items
        .get(index)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| NostrError::InvalidMessage(format!("{} missing or not a string", field)))
}

impl RelayMessage {
    pub fn from_json(json: &str) -> Result<Self> {
        let items: Vec<Value> = serde_json::from_str(json)
            .map_err(|e| NostrError::InvalidMessage(e.to_string()))?;
        let message_type = string_at(&items, 0, "message type")?;

        match message_type.as_str() {
            "EVENT" => {
                let subscription_id = string_at(&items, 1, "subscription_id")?;
                let event = items
                    .get(2)
                    .cloned()
                    .ok_or_else(|| NostrError::InvalidMessage("event missing".to_string()))?;
                Ok(RelayMessage::Event {
                    subscription_id,
                    event: Box::new(serde_json::from_value(event)?),
                })
            }
            "OK" => {
                let event_id = string_at(&items, 1, "event_id")?;
                let accepted = items.get(2).and_then(Value::as_bool).ok_or_else(|| {
                    NostrError::InvalidMessage("accepted flag not a boolean".to_string())
                })?;
                let message = string_at(&items, 3, "message").unwrap_or_default();
                Ok(RelayMessage::Ok {
                    event_id,
                    accepted,
                    message,
                })
            }
            "EOSE" => Ok(RelayMessage::Eose {
                subscription_id: string_at(&items, 1, "subscription_id")?,
            }),
            "CLOSED" => Ok(RelayMessage::Closed {
                subscription_id: string_at(&items, 1, "subscription_id")?,
                message: string_at(&items, 2, "message").unwrap_or_default(),
            }),
            "NOTICE" => Ok(RelayMessage::Notice {
                message: string_at(&items, 1, "message")?,
            }),
            other => Err(NostrError::InvalidMessage(format!(
                "unknown message type {}",
                other
            ))),
        }
    }
}
