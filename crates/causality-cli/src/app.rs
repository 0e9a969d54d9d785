//! Causality application context
//!
//! One [`CausalityApp`] is built per command from the loaded configuration. It owns the
//! event index client, the relay service, the local store and the signing identity, and
//! connects to the relay only when a command publishes or subscribes.

use std::sync::Arc;

use tracing::{debug, info};

use causality_api::{AssistantClient, EventApiClient};
use causality_core::{Event, LocalWallet, MessageSigner, UnsignedEvent};
use causality_nostr::{parse_keys, Keys, NostrService, Relay, Subscription};

use crate::config::AppConfig;
use crate::error::{CliError, Result};
use crate::store::LocalStore;

// ----------------------------------------------------------------------------
// Signing Identity
// ----------------------------------------------------------------------------

/// Key used to sign published events
pub enum Signer {
    /// Ethereum-style key: EIP-191 signature over the serialized event
    Wallet(LocalWallet),
    /// Nostr key: native Schnorr event
    Nostr(Keys),
}

impl Signer {
    /// Wallet secret wins over the Nostr secret; `None` when neither is configured
    pub fn from_config(config: &AppConfig) -> Result<Option<Self>> {
        if let Some(secret) = &config.wallet.secret_key {
            return Ok(Some(Signer::Wallet(LocalWallet::from_hex(secret)?)));
        }
        if let Some(secret) = &config.wallet.nostr_secret_key {
            return Ok(Some(Signer::Nostr(parse_keys(secret)?)));
        }
        Ok(None)
    }

    /// `0x` address for wallets, hex public key for Nostr keys
    pub fn address(&self) -> String {
        match self {
            Signer::Wallet(wallet) => wallet.address(),
            Signer::Nostr(keys) => keys.public_key().to_string(),
        }
    }
}

// ----------------------------------------------------------------------------
// Application
// ----------------------------------------------------------------------------

pub struct CausalityApp {
    config: AppConfig,
    api: EventApiClient,
    nostr: NostrService,
    store: LocalStore,
    signer: Option<Signer>,
}

impl CausalityApp {
    pub fn new(config: AppConfig) -> Result<Self> {
        let api = EventApiClient::new(config.to_api_config())?;
        let nostr = NostrService::new(config.to_relay_config());
        let store = LocalStore::new(config.data_dir());
        let signer = Signer::from_config(&config)?;

        match &signer {
            Some(signer) => debug!("Signing as {}", signer.address()),
            None => debug!("No signing key configured"),
        }

        Ok(Self {
            config,
            api,
            nostr,
            store,
            signer,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn api(&self) -> &EventApiClient {
        &self.api
    }

    pub fn nostr(&self) -> &NostrService {
        &self.nostr
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    pub fn assistant(&self) -> AssistantClient {
        AssistantClient::new(self.config.to_assistant_config())
    }

    pub fn signer(&self) -> Result<&Signer> {
        self.signer.as_ref().ok_or(CliError::WalletNotConfigured)
    }

    /// `address` when given, otherwise the configured signer's address
    pub fn address_or_signer(&self, address: Option<String>) -> Result<String> {
        match address {
            Some(address) => Ok(address),
            None => Ok(self.signer()?.address()),
        }
    }

    /// Use `relay` instead of connecting to the configured URL
    pub fn set_relay(&mut self, relay: Arc<dyn Relay>) {
        self.nostr.set_relay(relay);
    }

    async fn ensure_relay(&mut self) -> Result<()> {
        if self.nostr.relay().is_none() {
            info!("Connecting to relay {}", self.config.relay.url);
            self.nostr.connect(None).await?;
        }
        Ok(())
    }

    /// Sign `event` with the configured key and publish it to the relay.
    ///
    /// Fails before connecting when no key is configured.
    pub async fn publish(&mut self, event: UnsignedEvent) -> Result<Event> {
        if self.signer.is_none() {
            return Err(CliError::WalletNotConfigured);
        }
        self.ensure_relay().await?;

        let published = match self.signer()? {
            Signer::Wallet(wallet) => {
                let request = self.nostr.sign_with(event, wallet).await?;
                self.nostr.publish_signed(request).await?
            }
            Signer::Nostr(keys) => {
                let signed = self.nostr.sign_with_keys(event, keys)?;
                self.nostr.publish_event(&signed).await?;
                signed
            }
        };

        info!("Published event {}", published.id);
        Ok(published)
    }

    /// Live subspace creation events from the relay
    pub async fn watch_subspaces(&mut self, limit: usize) -> Result<Subscription> {
        self.ensure_relay().await?;
        Ok(self.nostr.subscribe_to_subspaces(limit).await?)
    }

    /// Close the relay connection if one was opened
    pub async fn shutdown(&mut self) -> Result<()> {
        self.nostr.disconnect().await?;
        Ok(())
    }
}
