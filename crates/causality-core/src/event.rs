//! Protocol event model
//!
//! An [`Event`] is an opaque signed record. This crate only assembles and forwards
//! events: the unsigned form is built by the governance builders, serialized into the
//! canonical array form, signed by an external wallet, and finalized here.
//!
//! ```json
//! {
//!   "id": "5c83...",
//!   "pubkey": "2c7536e3605d9c16a7a3d7b1898e529396a65c23",
//!   "created_at": 1717000000,
//!   "kind": 30302,
//!   "tags": [["d", "subspace_op"], ["sid", "0x1f..."], ["vote", "yes"]],
//!   "content": "",
//!   "sig": "b914..."
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::{CoreError, Result};
use crate::kind::EventKind;

/// Tags are small string arrays; the first element names the tag
pub type Tags = Vec<Vec<String>>;

/// Current Unix time in seconds
pub fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Strip an optional `0x` prefix from a hex string
pub fn strip_hex_prefix(value: &str) -> &str {
    value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value)
}

/// First value of the first tag named `key`
pub fn tag_value<'a>(tags: &'a [Vec<String>], key: &str) -> Option<&'a str> {
    tags.iter()
        .find(|tag| tag.first().map(String::as_str) == Some(key))
        .and_then(|tag| tag.get(1))
        .map(String::as_str)
}

// ----------------------------------------------------------------------------
// Signed Event
// ----------------------------------------------------------------------------

/// Signed protocol event as served by the index and relay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Hex SHA-256 of the canonical serialization
    pub id: String,
    /// Signer identity (wallet address without `0x`, or a Nostr x-only key)
    pub pubkey: String,
    /// Unix timestamp in seconds
    pub created_at: u64,
    /// Kind integer, see [`crate::kind`]
    pub kind: u16,
    /// Free-form content, often JSON
    pub content: String,
    /// Tag arrays
    pub tags: Tags,
    /// Signature hex without `0x`
    pub sig: String,
}

impl Event {
    /// First value of the tag named `key`
    pub fn tag(&self, key: &str) -> Option<&str> {
        tag_value(&self.tags, key)
    }

    /// Whether a tag `[key, value, ...]` is present
    pub fn has_tag(&self, key: &str, value: &str) -> bool {
        self.tag(key) == Some(value)
    }

    /// Known governance kind, if any
    pub fn event_kind(&self) -> Option<EventKind> {
        EventKind::try_from(self.kind).ok()
    }

    pub fn is_kind(&self, kind: EventKind) -> bool {
        self.kind == kind.as_u16()
    }

    /// Parse the content as a JSON object; `None` when it is not JSON
    pub fn content_json(&self) -> Option<Value> {
        serde_json::from_str::<Value>(&self.content)
            .ok()
            .filter(Value::is_object)
    }

    /// The unsigned form of this event
    pub fn unsigned(&self) -> UnsignedEvent {
        UnsignedEvent {
            pubkey: self.pubkey.clone(),
            created_at: self.created_at,
            kind: self.kind,
            tags: self.tags.clone(),
            content: self.content.clone(),
        }
    }

    /// Whether `id` matches the hash of the event's canonical serialization
    pub fn has_valid_id(&self) -> bool {
        self.unsigned().id() == self.id
    }
}

// ----------------------------------------------------------------------------
// Unsigned Event
// ----------------------------------------------------------------------------

/// Event awaiting a signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsignedEvent {
    pub pubkey: String,
    pub created_at: u64,
    pub kind: u16,
    pub tags: Tags,
    pub content: String,
}

impl UnsignedEvent {
    /// New event stamped with the current time and an empty pubkey
    pub fn new(kind: EventKind, tags: Tags, content: impl Into<String>) -> Self {
        Self {
            pubkey: String::new(),
            created_at: unix_now(),
            kind: kind.as_u16(),
            tags,
            content: content.into(),
        }
    }

    /// Set the signer identity; a leading `0x` is dropped
    pub fn with_pubkey(mut self, pubkey: &str) -> Self {
        self.pubkey = strip_hex_prefix(pubkey).to_string();
        self
    }

    pub fn with_created_at(mut self, created_at: u64) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        tag_value(&self.tags, key)
    }

    /// Canonical serialization `[0, pubkey, created_at, kind, tags, content]`.
    ///
    /// This is the exact string the wallet signs and the preimage of the event id.
    pub fn serialize(&self) -> String {
        serde_json::json!([
            0,
            self.pubkey,
            self.created_at,
            self.kind,
            self.tags,
            self.content
        ])
        .to_string()
    }

    /// Hex SHA-256 of [`UnsignedEvent::serialize`]
    pub fn id(&self) -> String {
        hex::encode(Sha256::digest(self.serialize().as_bytes()))
    }

    /// Attach an externally produced signature.
    ///
    /// `address` becomes the pubkey and both values lose any `0x` prefix.
    pub fn finalize_by_sig(self, address: &str, sig: &str) -> Result<Event> {
        let address = strip_hex_prefix(address.trim());
        let sig = strip_hex_prefix(sig.trim());
        if address.is_empty() {
            return Err(CoreError::MissingField("address"));
        }
        if sig.is_empty() {
            return Err(CoreError::Signature("empty signature".to_string()));
        }
        hex::decode(sig)?;

        let unsigned = self.with_pubkey(address);
        Ok(Event {
            id: unsigned.id(),
            pubkey: unsigned.pubkey,
            created_at: unsigned.created_at,
            kind: unsigned.kind,
            content: unsigned.content,
            tags: unsigned.tags,
            sig: sig.to_string(),
        })
    }
}
