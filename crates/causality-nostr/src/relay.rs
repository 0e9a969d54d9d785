//! Relay connections
//!
//! [`Relay`] is the seam the publishing service talks to. [`WsRelay`] implements it over a
//! single WebSocket: one background task reads relay messages, resolving pending
//! publishes by event id and forwarding subscription events to their channels, while
//! writes go through the sink half under a mutex.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use causality_core::Event;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use crate::config::RelayConfig;
use crate::error::{NostrError, Result};
use crate::message::{ClientMessage, Filter, RelayMessage};

/// Live subscription; events arrive on `events` until the relay or the caller closes it
#[derive(Debug)]
pub struct Subscription {
    pub id: String,
    pub events: mpsc::UnboundedReceiver<Event>,
}

/// Anything events can be published to and read from
#[async_trait]
pub trait Relay: Send + Sync {
    fn url(&self) -> &str;

    /// Send an event and wait for the relay to accept it
    async fn publish(&self, event: &Event) -> Result<()>;

    async fn subscribe(&self, filters: Vec<Filter>) -> Result<Subscription>;

    async fn unsubscribe(&self, subscription_id: &str) -> Result<()>;

    async fn close(&self) -> Result<()>;
}

// ----------------------------------------------------------------------------
// WebSocket Relay
// ----------------------------------------------------------------------------

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type PendingMap = Arc<Mutex<HashMap<String, oneshot::Sender<(bool, String)>>>>;
type SubscriptionMap = Arc<Mutex<HashMap<String, mpsc::UnboundedSender<Event>>>>;

pub struct WsRelay {
    config: RelayConfig,
    writer: Mutex<SplitSink<WsStream, Message>>,
    pending: PendingMap,
    subscriptions: SubscriptionMap,
    reader: JoinHandle<()>,
}

/// Parse and check a relay URL
pub fn parse_relay_url(url: &str) -> Result<Url> {
    let parsed = Url::parse(url).map_err(|_| NostrError::InvalidRelayUrl {
        url: url.to_string(),
    })?;
    if parsed.scheme() != "ws" && parsed.scheme() != "wss" {
        return Err(NostrError::InvalidRelayUrl {
            url: url.to_string(),
        });
    }
    Ok(parsed)
}

impl WsRelay {
    /// Open the WebSocket and start the reader task
    pub async fn connect(config: RelayConfig) -> Result<Self> {
        let url = parse_relay_url(&config.url)?;
        info!("Connecting to relay: {}", url);

        let (stream, _) = timeout(config.connect_timeout, connect_async(url.as_str()))
            .await
            .map_err(|_| NostrError::Timeout {
                waiting_for: "relay connection",
                seconds: config.connect_timeout.as_secs(),
            })?
            .map_err(|e| NostrError::RelayConnectionFailed {
                relay: config.url.clone(),
                reason: e.to_string(),
            })?;

        let (writer, mut reader) = stream.split();
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let subscriptions: SubscriptionMap = Arc::new(Mutex::new(HashMap::new()));

        let task_pending = Arc::clone(&pending);
        let task_subscriptions = Arc::clone(&subscriptions);
        let relay_url = config.url.clone();
        let reader = tokio::spawn(async move {
            while let Some(message) = reader.next().await {
                match message {
                    Ok(Message::Text(text)) => {
                        route_message(&text, &task_pending, &task_subscriptions).await
                    }
                    Ok(Message::Close(_)) => {
                        info!("Relay {} closed connection", relay_url);
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!("WebSocket error from {}: {}", relay_url, e);
                        break;
                    }
                }
            }
            // Dropping the senders wakes every waiter with a closed channel
            task_pending.lock().await.clear();
            task_subscriptions.lock().await.clear();
        });

        info!("Connected to relay: {}", config.url);
        Ok(Self {
            config,
            writer: Mutex::new(writer),
            pending,
            subscriptions,
            reader,
        })
    }

    async fn send(&self, message: &ClientMessage) -> Result<()> {
        let json = message.to_json()?;
        debug!("Sending to {}: {}", self.config.url, json);
        self.writer.lock().await.send(Message::Text(json)).await?;
        Ok(())
    }
}

async fn route_message(text: &str, pending: &PendingMap, subscriptions: &SubscriptionMap) {
    let message = match RelayMessage::from_json(text) {
        Ok(message) => message,
        Err(e) => {
            debug!("Ignoring relay message: {}", e);
            return;
        }
    };

    match message {
        RelayMessage::Ok {
            event_id,
            accepted,
            message,
        } => {
            if let Some(tx) = pending.lock().await.remove(&event_id) {
                let _ = tx.send((accepted, message));
            }
        }
        RelayMessage::Event {
            subscription_id,
            event,
        } => {
            let mut subs = subscriptions.lock().await;
            let closed = match subs.get(&subscription_id) {
                Some(tx) => tx.send(*event).is_err(),
                None => false,
            };
            if closed {
                debug!("Subscription {} receiver dropped, removing", subscription_id);
                subs.remove(&subscription_id);
            }
        }
        RelayMessage::Eose { subscription_id } => {
            debug!("End of stored events for {}", subscription_id);
        }
        RelayMessage::Closed {
            subscription_id,
            message,
        } => {
            info!("Relay closed subscription {}: {}", subscription_id, message);
            subscriptions.lock().await.remove(&subscription_id);
        }
        RelayMessage::Notice { message } => {
            info!("Relay notice: {}", message);
        }
    }
}

#[async_trait]
impl Relay for WsRelay {
    fn url(&self) -> &str {
        &self.config.url
    }

    async fn publish(&self, event: &Event) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(event.id.clone(), tx);

        if let Err(e) = self.send(&ClientMessage::Event(Box::new(event.clone()))).await {
            self.pending.lock().await.remove(&event.id);
            return Err(e);
        }

        match timeout(self.config.publish_timeout, rx).await {
            Ok(Ok((true, _))) => {
                info!("Event {} accepted by {}", event.id, self.config.url);
                Ok(())
            }
            Ok(Ok((false, message))) => Err(NostrError::Rejected {
                event_id: event.id.clone(),
                message,
            }),
            Ok(Err(_)) => Err(NostrError::ConnectionClosed),
            Err(_) => {
                self.pending.lock().await.remove(&event.id);
                Err(NostrError::Timeout {
                    waiting_for: "relay acknowledgement",
                    seconds: self.config.publish_timeout.as_secs(),
                })
            }
        }
    }

    async fn subscribe(&self, filters: Vec<Filter>) -> Result<Subscription> {
        let id = Uuid::new_v4().simple().to_string();
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscriptions.lock().await.insert(id.clone(), tx);

        let request = ClientMessage::Req {
            subscription_id: id.clone(),
            filters,
        };
        if let Err(e) = self.send(&request).await {
            self.subscriptions.lock().await.remove(&id);
            return Err(e);
        }
        Ok(Subscription { id, events: rx })
    }

    async fn unsubscribe(&self, subscription_id: &str) -> Result<()> {
        self.subscriptions.lock().await.remove(subscription_id);
        self.send(&ClientMessage::Close {
            subscription_id: subscription_id.to_string(),
        })
        .await
    }

    async fn close(&self) -> Result<()> {
        info!("Disconnecting from relay: {}", self.config.url);
        let result = self.writer.lock().await.close().await;
        self.reader.abort();
        self.pending.lock().await.clear();
        self.subscriptions.lock().await.clear();
        result.map_err(NostrError::from)
    }
}

impl Drop for WsRelay {
    fn drop(&mut self) {
        self.reader.abort();
    }
}
