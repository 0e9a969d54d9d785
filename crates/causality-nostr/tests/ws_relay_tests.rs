//! WebSocket relay tests
//!
//! Drives [`WsRelay`] against a local relay server so the reader task, the pending
//! acknowledgement map and the publish timeout run over a real socket. The server
//! answers by event content: `"reject"` gets a failed OK, `"silent"` gets nothing,
//! anything else is accepted. A REQ is answered with every event accepted so far.

use std::net::SocketAddr;
use std::time::Duration;

use causality_core::Event;
use causality_nostr::{Filter, NostrError, Relay, RelayConfig, WsRelay};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{accept_async, tungstenite::Message};

// ----------------------------------------------------------------------------
// Test Utilities
// ----------------------------------------------------------------------------

async fn spawn_relay() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(serve_connection(stream));
        }
    });
    addr
}

async fn serve_connection(stream: TcpStream) {
    let mut ws = accept_async(stream).await.unwrap();
    let mut stored: Vec<Value> = Vec::new();

    while let Some(Ok(message)) = ws.next().await {
        let Message::Text(text) = message else {
            continue;
        };
        let frame: Value = serde_json::from_str(&text).unwrap();
        let replies = match frame[0].as_str() {
            Some("EVENT") => {
                let event = frame[1].clone();
                let id = event["id"].clone();
                match event["content"].as_str() {
                    Some("silent") => vec![],
                    Some("reject") => vec![json!(["OK", id, false, "blocked: spam"])],
                    _ => {
                        stored.push(event);
                        vec![json!(["OK", id, true, ""])]
                    }
                }
            }
            Some("REQ") => {
                let sub = frame[1].clone();
                let mut out: Vec<Value> = stored
                    .iter()
                    .map(|event| json!(["EVENT", sub, event]))
                    .collect();
                out.push(json!(["EOSE", sub]));
                out
            }
            _ => vec![],
        };
        for reply in replies {
            if ws.send(Message::Text(reply.to_string())).await.is_err() {
                return;
            }
        }
    }
}

async fn connect(addr: SocketAddr) -> WsRelay {
    let config = RelayConfig::new(format!("ws://{}", addr))
        .with_publish_timeout(Duration::from_millis(200));
    WsRelay::connect(config).await.unwrap()
}

fn event(id: &str, content: &str) -> Event {
    Event {
        id: id.to_string(),
        pubkey: "2c7536e3605d9c16a7a3d7b1898e529396a65c23".to_string(),
        created_at: 1_717_000_000,
        kind: 30302,
        content: content.to_string(),
        tags: vec![vec!["d".to_string(), "subspace_op".to_string()]],
        sig: "b914".to_string(),
    }
}

// ----------------------------------------------------------------------------
// Publish
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_publish_accepted() {
    let relay = connect(spawn_relay().await).await;
    relay.publish(&event("aa01", "hello")).await.unwrap();
    relay.close().await.unwrap();
}

#[tokio::test]
async fn test_publish_rejected() {
    let relay = connect(spawn_relay().await).await;
    match relay.publish(&event("aa02", "reject")).await {
        Err(NostrError::Rejected { event_id, message }) => {
            assert_eq!(event_id, "aa02");
            assert_eq!(message, "blocked: spam");
        }
        other => panic!("expected rejection, got {:?}", other),
    }
}

#[tokio::test]
async fn test_publish_times_out_without_ack() {
    let relay = connect(spawn_relay().await).await;
    assert!(matches!(
        relay.publish(&event("aa03", "silent")).await,
        Err(NostrError::Timeout {
            waiting_for: "relay acknowledgement",
            ..
        })
    ));

    // A timed-out publish leaves no stale waiter behind
    relay.publish(&event("aa04", "after")).await.unwrap();
}

#[tokio::test]
async fn test_concurrent_publishes_resolve_by_id() {
    let relay = connect(spawn_relay().await).await;
    let first = event("bb01", "one");
    let rejected = event("bb02", "reject");
    let second = event("bb03", "two");
    let (a, b, c) = tokio::join!(
        relay.publish(&first),
        relay.publish(&rejected),
        relay.publish(&second)
    );
    assert!(a.is_ok());
    assert!(matches!(b, Err(NostrError::Rejected { event_id, .. }) if event_id == "bb02"));
    assert!(c.is_ok());
}

// ----------------------------------------------------------------------------
// Subscribe
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_subscription_receives_stored_events() {
    let relay = connect(spawn_relay().await).await;
    relay.publish(&event("cc01", "stored")).await.unwrap();

    let mut sub = relay
        .subscribe(vec![Filter::new().kind(30302)])
        .await
        .unwrap();
    let received = tokio::time::timeout(Duration::from_secs(2), sub.events.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(received.id, "cc01");
    assert_eq!(received.content, "stored");

    relay.unsubscribe(&sub.id).await.unwrap();
}

#[tokio::test]
async fn test_connect_refused() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let result = WsRelay::connect(RelayConfig::new(format!("ws://{}", addr))).await;
    assert!(matches!(
        result,
        Err(NostrError::RelayConnectionFailed { .. })
    ));
}
