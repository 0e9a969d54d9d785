//! Causality Nostr
//!
//! Publishing side of the governance client: NIP-01 relay messages, a WebSocket relay
//! connection and [`NostrService`], which builds governance events, finalizes them with
//! wallet signatures and sends them to the relay.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod config;
pub mod error;
pub mod message;
pub mod relay;
pub mod service;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use config::{RelayConfig, DEFAULT_RELAY_URL};
pub use error::{NostrError, Result};
pub use message::{ClientMessage, Filter, RelayMessage};
pub use relay::{Relay, Subscription, WsRelay};
pub use service::{parse_keys, NostrService, SignedRequest};

/// Re-exported so callers can hold native Nostr keys without depending on `nostr-sdk`
pub use nostr_sdk::Keys;
