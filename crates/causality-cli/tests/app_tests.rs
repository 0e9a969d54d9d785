//! Application publishing through an in-memory relay

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use causality_cli::{AppConfig, CausalityApp, CliError, Signer};
use causality_core::{wallet::verify_event, Event, EventKind};
use causality_nostr::{Filter, Relay, Subscription};
use tempfile::TempDir;
use tokio::sync::mpsc;

const WALLET_KEY: &str = "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";
const WALLET_ADDRESS: &str = "0x2c7536E3605D9C16a7a3D7b1898e529396a65c23";
const NOSTR_KEY: &str = "6b911fd37cdf5c81d4c0adb1ab7fa822ed253ab0ad9aa18d77257c88b29b718e";

#[derive(Default)]
struct MemoryRelay {
    published: Mutex<Vec<Event>>,
}

#[async_trait]
impl Relay for MemoryRelay {
    fn url(&self) -> &str {
        "memory://relay"
    }

    async fn publish(&self, event: &Event) -> causality_nostr::Result<()> {
        self.published.lock().unwrap().push(event.clone());
        Ok(())
    }

    async fn subscribe(&self, _filters: Vec<Filter>) -> causality_nostr::Result<Subscription> {
        let (tx, rx) = mpsc::unbounded_channel();
        for event in self.published.lock().unwrap().iter() {
            let _ = tx.send(event.clone());
        }
        Ok(Subscription {
            id: "memory".to_string(),
            events: rx,
        })
    }

    async fn unsubscribe(&self, _subscription_id: &str) -> causality_nostr::Result<()> {
        Ok(())
    }

    async fn close(&self) -> causality_nostr::Result<()> {
        Ok(())
    }
}

fn config(dir: &TempDir) -> AppConfig {
    let mut config = AppConfig::default();
    config.storage.data_dir = Some(dir.path().to_path_buf());
    config
}

fn app_with_relay(config: AppConfig) -> (CausalityApp, Arc<MemoryRelay>) {
    let relay = Arc::new(MemoryRelay::default());
    let mut app = CausalityApp::new(config).unwrap();
    app.set_relay(relay.clone());
    (app, relay)
}

#[tokio::test]
async fn test_publish_without_key_fails_first() {
    let dir = TempDir::new().unwrap();
    let (mut app, relay) = app_with_relay(config(&dir));

    let event = app
        .nostr()
        .create_subspace("Guild", "post=30300", "r", "a guild", "")
        .unwrap();
    assert!(matches!(
        app.publish(event).await,
        Err(CliError::WalletNotConfigured)
    ));
    assert!(relay.published.lock().unwrap().is_empty());
    assert!(matches!(
        app.address_or_signer(None),
        Err(CliError::WalletNotConfigured)
    ));
}

#[tokio::test]
async fn test_wallet_signed_publish() {
    let dir = TempDir::new().unwrap();
    let mut config = config(&dir);
    config.wallet.secret_key = Some(WALLET_KEY.to_string());
    let (mut app, relay) = app_with_relay(config);

    assert_eq!(app.signer().unwrap().address(), WALLET_ADDRESS);
    assert_eq!(app.address_or_signer(None).unwrap(), WALLET_ADDRESS);
    assert_eq!(app.address_or_signer(Some("0xabc".into())).unwrap(), "0xabc");

    let event = app
        .nostr()
        .create_subspace("Guild", "post=30300,vote=30302", "r", "desc", "")
        .unwrap();
    let published = app.publish(event).await.unwrap();

    assert_eq!(published.kind, EventKind::SubspaceCreate.as_u16());
    assert!(WALLET_ADDRESS
        .trim_start_matches("0x")
        .eq_ignore_ascii_case(&published.pubkey));
    verify_event(&published).unwrap();

    let stored = relay.published.lock().unwrap().clone();
    assert_eq!(stored, vec![published]);
}

#[tokio::test]
async fn test_nostr_key_signed_publish() {
    let dir = TempDir::new().unwrap();
    let mut config = config(&dir);
    config.wallet.nostr_secret_key = Some(NOSTR_KEY.to_string());
    let (mut app, relay) = app_with_relay(config);

    let signer_address = match app.signer().unwrap() {
        Signer::Nostr(keys) => keys.public_key().to_string(),
        Signer::Wallet(_) => panic!("expected a Nostr signer"),
    };

    let sid = causality_core::calculate_subspace_id("Guild", "post=30300", "r");
    let event = app.nostr().create_post(&sid, "hello", None).unwrap();
    let published = app.publish(event).await.unwrap();

    assert_eq!(published.kind, EventKind::Post.as_u16());
    assert_eq!(published.pubkey, signer_address);
    assert_eq!(published.tag("sid"), Some(sid.as_str()));
    assert_eq!(relay.published.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_watch_uses_injected_relay() {
    let dir = TempDir::new().unwrap();
    let mut config = config(&dir);
    config.wallet.secret_key = Some(WALLET_KEY.to_string());
    let (mut app, _relay) = app_with_relay(config);

    let event = app
        .nostr()
        .create_subspace("Guild", "post=30300", "r", "a guild", "")
        .unwrap();
    let published = app.publish(event).await.unwrap();

    let mut subscription = app.watch_subspaces(10).await.unwrap();
    let received = subscription.events.recv().await.unwrap();
    assert_eq!(received.id, published.id);

    app.shutdown().await.unwrap();
    assert!(app.nostr().relay().is_none());
}

#[test]
fn test_store_uses_configured_data_dir() {
    let dir = TempDir::new().unwrap();
    let app = CausalityApp::new(config(&dir)).unwrap();
    assert_eq!(app.store().dir(), dir.path());
}
