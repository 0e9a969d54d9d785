//! Event construction and publishing
//!
//! [`NostrService`] builds unsigned governance events, finalizes them with a wallet
//! signature and hands them to the configured relay. Building is pure; only the
//! `publish_*` methods and relay management touch the network.

use std::sync::Arc;

use causality_core::event::strip_hex_prefix;
use causality_core::wallet;
use causality_core::{
    CoreError, Event, EventKind, GovernanceEvent, MessageSigner, MintParams, SubspaceCreate,
    SubspaceJoin, UnsignedEvent, VoteChoice,
};
use nostr_sdk::{EventBuilder, Keys, Kind, Tag, Timestamp};
use tracing::{debug, info};

use crate::config::RelayConfig;
use crate::error::{NostrError, Result};
use crate::message::Filter;
use crate::relay::{Relay, Subscription, WsRelay};

/// An unsigned event together with the wallet signature over its serialization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRequest {
    /// The event with its pubkey set to the signer address
    pub event: UnsignedEvent,
    pub address: String,
    pub signature: String,
}

#[derive(Default)]
pub struct NostrService {
    config: RelayConfig,
    relay: Option<Arc<dyn Relay>>,
}

impl NostrService {
    pub fn new(config: RelayConfig) -> Self {
        Self {
            config,
            relay: None,
        }
    }

    // ---- Relay Management ----

    pub fn set_relay(&mut self, relay: Arc<dyn Relay>) {
        info!("Relay set: {}", relay.url());
        self.relay = Some(relay);
    }

    pub fn relay(&self) -> Option<&Arc<dyn Relay>> {
        self.relay.as_ref()
    }

    fn require_relay(&self) -> Result<&Arc<dyn Relay>> {
        self.relay.as_ref().ok_or(NostrError::RelayNotSet)
    }

    /// Open a WebSocket relay (the configured URL unless `url` is given) and use it
    pub async fn connect(&mut self, url: Option<&str>) -> Result<()> {
        let mut config = self.config.clone();
        if let Some(url) = url {
            config.url = url.to_string();
        }
        let relay = WsRelay::connect(config).await?;
        self.set_relay(Arc::new(relay));
        Ok(())
    }

    pub async fn disconnect(&mut self) -> Result<()> {
        match self.relay.take() {
            Some(relay) => relay.close().await,
            None => Ok(()),
        }
    }

    /// Subscribe to subspace creation events, newest `limit` first
    pub async fn subscribe_to_subspaces(&self, limit: usize) -> Result<Subscription> {
        let filter = Filter::new()
            .kind(EventKind::SubspaceCreate.as_u16())
            .limit(limit);
        self.require_relay()?.subscribe(vec![filter]).await
    }

    // ---- Event Construction ----

    pub fn create_subspace(
        &self,
        name: &str,
        ops: &str,
        rules: &str,
        description: &str,
        image_url: &str,
    ) -> Result<UnsignedEvent> {
        let create = SubspaceCreate::new(name, ops, rules, description, image_url)?;
        debug!("Built subspace {} ({})", create.name, create.subspace_id);
        Ok(create.to_unsigned())
    }

    pub fn create_join_subspace(&self, subspace_id: &str) -> Result<UnsignedEvent> {
        Ok(SubspaceJoin::new(subspace_id)?.to_unsigned())
    }

    /// Post, or a comment on `parent` when given
    pub fn create_post(
        &self,
        subspace_id: &str,
        content: &str,
        parent: Option<&str>,
    ) -> Result<UnsignedEvent> {
        let mut post = GovernanceEvent::post(subspace_id, content)?;
        if let Some(parent) = parent {
            post.set_parent(parent);
        }
        Ok(post.to_unsigned())
    }

    pub fn create_propose(&self, subspace_id: &str, content: &str) -> Result<UnsignedEvent> {
        Ok(GovernanceEvent::propose(subspace_id, content)?.to_unsigned())
    }

    pub fn create_vote(
        &self,
        subspace_id: &str,
        proposal_id: &str,
        vote: &str,
        content: &str,
    ) -> Result<UnsignedEvent> {
        if vote.trim().is_empty() {
            return Err(CoreError::MissingField("vote").into());
        }
        let choice: VoteChoice = vote.parse()?;
        Ok(GovernanceEvent::vote(subspace_id, proposal_id, choice, content)?.to_unsigned())
    }

    pub fn create_invite(
        &self,
        subspace_id: &str,
        invitee: &str,
        rules: Option<&str>,
        content: &str,
    ) -> Result<UnsignedEvent> {
        Ok(GovernanceEvent::invite(subspace_id, invitee, rules, content)?.to_unsigned())
    }

    pub fn create_mint(
        &self,
        subspace_id: &str,
        params: &MintParams,
        content: &str,
    ) -> Result<UnsignedEvent> {
        Ok(GovernanceEvent::mint(subspace_id, params, content)?.to_unsigned())
    }

    // ---- Publishing ----

    pub async fn publish_create_subspace(
        &self,
        event: UnsignedEvent,
        address: &str,
        signature: &str,
    ) -> Result<Event> {
        self.publish_as(EventKind::SubspaceCreate, event, address, signature)
            .await
    }

    pub async fn publish_join_subspace(
        &self,
        event: UnsignedEvent,
        address: &str,
        signature: &str,
    ) -> Result<Event> {
        self.publish_as(EventKind::SubspaceJoin, event, address, signature)
            .await
    }

    pub async fn publish_post(
        &self,
        event: UnsignedEvent,
        address: &str,
        signature: &str,
    ) -> Result<Event> {
        self.publish_as(EventKind::Post, event, address, signature).await
    }

    pub async fn publish_propose(
        &self,
        event: UnsignedEvent,
        address: &str,
        signature: &str,
    ) -> Result<Event> {
        self.publish_as(EventKind::Propose, event, address, signature)
            .await
    }

    pub async fn publish_vote(
        &self,
        event: UnsignedEvent,
        address: &str,
        signature: &str,
    ) -> Result<Event> {
        self.publish_as(EventKind::Vote, event, address, signature).await
    }

    pub async fn publish_invite(
        &self,
        event: UnsignedEvent,
        address: &str,
        signature: &str,
    ) -> Result<Event> {
        self.publish_as(EventKind::Invite, event, address, signature)
            .await
    }

    pub async fn publish_mint(
        &self,
        event: UnsignedEvent,
        address: &str,
        signature: &str,
    ) -> Result<Event> {
        self.publish_as(EventKind::Mint, event, address, signature).await
    }

    /// Publish a signed request through the `publish_*` method matching its kind
    pub async fn publish_signed(&self, request: SignedRequest) -> Result<Event> {
        let kind = EventKind::try_from(request.event.kind)?;
        self.publish_as(kind, request.event, &request.address, &request.signature)
            .await
    }

    /// Send an already finalized event as is
    pub async fn publish_event(&self, event: &Event) -> Result<()> {
        self.require_relay()?.publish(event).await
    }

    async fn publish_as(
        &self,
        expected: EventKind,
        event: UnsignedEvent,
        address: &str,
        signature: &str,
    ) -> Result<Event> {
        let relay = self.require_relay()?;
        if event.kind != expected.as_u16() {
            return Err(NostrError::WrongKind {
                expected,
                actual: event.kind,
            });
        }
        if strip_hex_prefix(signature.trim()).is_empty() {
            return Err(NostrError::EmptySignature);
        }

        let finalized = event.finalize_by_sig(address, signature)?;
        debug!("Publishing {} event {}", expected, finalized.id);
        relay.publish(&finalized).await?;
        Ok(finalized)
    }

    // ---- Signing ----

    /// Checksummed address that produced `signature` over `message`
    pub fn recover_address(&self, message: &str, signature: &str) -> Result<String> {
        Ok(wallet::recover_address(message, signature)?)
    }

    /// Have `signer` sign the event and check the signature recovers to its address
    pub async fn sign_with(
        &self,
        event: UnsignedEvent,
        signer: &dyn MessageSigner,
    ) -> Result<SignedRequest> {
        let address = signer.address();
        let event = event.with_pubkey(&address);
        let message = event.serialize();

        let signature = signer.sign_message(&message).await?;
        if strip_hex_prefix(signature.trim()).is_empty() {
            return Err(NostrError::EmptySignature);
        }
        wallet::verify_message(&message, &signature, &address)?;

        Ok(SignedRequest {
            event,
            address,
            signature,
        })
    }

    /// Sign with a Nostr secret key (Schnorr) instead of a wallet
    pub fn sign_with_keys(&self, event: UnsignedEvent, keys: &Keys) -> Result<Event> {
        let tags = event
            .tags
            .iter()
            .map(|tag| {
                Tag::parse(tag.as_slice()).map_err(|e| NostrError::NativeEvent(e.to_string()))
            })
            .collect::<Result<Vec<Tag>>>()?;

        let signed = EventBuilder::new(Kind::Custom(event.kind.into()), event.content, tags)
            .custom_created_at(Timestamp::from(event.created_at))
            .to_event(keys)
            .map_err(|e| NostrError::NativeEvent(e.to_string()))?;

        Ok(serde_json::from_value(serde_json::to_value(&signed)?)?)
    }
}

/// Parse a Nostr secret key (hex or bech32)
pub fn parse_keys(secret: &str) -> Result<Keys> {
    Ok(Keys::parse(secret.trim())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use causality_core::{calculate_subspace_id, LocalWallet};

    fn sid() -> String {
        calculate_subspace_id("dao", "post=30300", "rules")
    }

    #[test]
    fn test_create_vote_validates() {
        let service = NostrService::default();
        let event = service.create_vote(&sid(), "p1", "yes", "").unwrap();
        assert_eq!(event.tag("vote"), Some("yes"));

        assert!(matches!(
            service.create_vote(&sid(), "p1", " ", ""),
            Err(NostrError::Core(CoreError::MissingField("vote")))
        ));
        assert!(service.create_vote(&sid(), "p1", "perhaps", "").is_err());
        assert!(matches!(
            service.create_vote(&sid(), "p1", "for", ""),
            Err(NostrError::Core(CoreError::OutOfRange { field: "vote", .. }))
        ));
        assert!(service.create_vote("", "p1", "yes", "").is_err());
    }

    #[test]
    fn test_create_post_with_parent() {
        let service = NostrService::default();
        let post = service.create_post(&sid(), "hi", Some("parent-id")).unwrap();
        assert_eq!(post.tag("parent"), Some("parent-id"));
        let plain = service.create_post(&sid(), "hi", None).unwrap();
        assert_eq!(plain.tag("parent"), None);
    }

    #[tokio::test]
    async fn test_publish_without_relay() {
        let service = NostrService::default();
        let event = service.create_join_subspace(&sid()).unwrap();
        assert!(matches!(
            service.publish_join_subspace(event, "0xabc", "0xdead").await,
            Err(NostrError::RelayNotSet)
        ));
    }

    #[tokio::test]
    async fn test_sign_with_wallet() {
        let service = NostrService::default();
        let wallet = LocalWallet::random();
        let event = service.create_propose(&sid(), "proposal").unwrap();

        let signed = service.sign_with(event, &wallet).await.unwrap();
        assert_eq!(signed.address, wallet.address());
        assert_eq!(signed.event.pubkey, strip_hex_prefix(&wallet.address()));
        assert_eq!(
            service
                .recover_address(&signed.event.serialize(), &signed.signature)
                .unwrap(),
            wallet.address()
        );
    }

    #[test]
    fn test_sign_with_keys() {
        let service = NostrService::default();
        let keys = Keys::generate();
        let unsigned = service
            .create_post(&sid(), "native", None)
            .unwrap()
            .with_created_at(1_700_000_000);

        let event = service.sign_with_keys(unsigned.clone(), &keys).unwrap();
        assert_eq!(event.kind, 30300);
        assert_eq!(event.created_at, 1_700_000_000);
        assert_eq!(event.tags, unsigned.tags);
        assert_eq!(event.pubkey, keys.public_key().to_string());
        assert_eq!(event.sig.len(), 128);
    }
}
