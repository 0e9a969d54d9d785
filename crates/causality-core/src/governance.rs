//! Governance operations inside a subspace
//!
//! Posts, proposals, votes, invites and mint requests share one envelope: a
//! `d=subspace_op` tag, the subspace id and the operation name. Each operation then adds
//! its own tags through the setters below.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::event::{Tags, UnsignedEvent};
use crate::kind::EventKind;
use crate::subspace::validate_subspace_id;

pub const DEFAULT_CONTENT_TYPE: &str = "markdown";
pub const DEFAULT_PROPOSAL_ID: &str = "normal";
pub const DEFAULT_PROPOSAL_RULES: &str = "normal_rule";

/// Ballot value carried in a vote's `vote` tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteChoice {
    Yes,
    No,
    Abstain,
}

impl VoteChoice {
    pub fn as_str(self) -> &'static str {
        match self {
            VoteChoice::Yes => "yes",
            VoteChoice::No => "no",
            VoteChoice::Abstain => "abstain",
        }
    }
}

impl FromStr for VoteChoice {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "yes" => Ok(VoteChoice::Yes),
            "no" => Ok(VoteChoice::No),
            "abstain" => Ok(VoteChoice::Abstain),
            other => Err(CoreError::OutOfRange {
                field: "vote",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for VoteChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Token parameters of a mint request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintParams {
    pub token_name: String,
    pub token_symbol: String,
    pub token_decimals: u8,
    pub init_supply: u64,
    pub drop_ratio: String,
}

/// Title and body of a proposal, stored as JSON content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalContent {
    pub title: String,
    pub description: String,
}

impl ProposalContent {
    pub fn to_content(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

// ----------------------------------------------------------------------------
// Governance Event
// ----------------------------------------------------------------------------

/// Unsigned governance operation inside a subspace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovernanceEvent {
    pub subspace_id: String,
    pub op: EventKind,
    pub content: String,
    /// Operation-specific tags appended after the envelope
    pub tags: Tags,
}

impl GovernanceEvent {
    fn new(subspace_id: &str, op: EventKind, content: &str) -> Result<Self> {
        let subspace_id = subspace_id.trim();
        if subspace_id.is_empty() {
            return Err(CoreError::MissingField("subspace_id"));
        }
        validate_subspace_id(subspace_id)?;
        Ok(Self {
            subspace_id: subspace_id.to_string(),
            op,
            content: content.to_string(),
            tags: Vec::new(),
        })
    }

    /// Post (or comment when a parent is set)
    pub fn post(subspace_id: &str, content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Err(CoreError::MissingField("content"));
        }
        let mut event = Self::new(subspace_id, EventKind::Post, content)?;
        event.set_tag("content_type", DEFAULT_CONTENT_TYPE);
        Ok(event)
    }

    /// Proposal with the default proposal id and rules
    pub fn propose(subspace_id: &str, content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Err(CoreError::MissingField("content"));
        }
        let mut event = Self::new(subspace_id, EventKind::Propose, content)?;
        event.set_proposal(DEFAULT_PROPOSAL_ID, DEFAULT_PROPOSAL_RULES);
        Ok(event)
    }

    /// Vote on the proposal whose event id is `proposal_id`
    pub fn vote(
        subspace_id: &str,
        proposal_id: &str,
        choice: VoteChoice,
        content: &str,
    ) -> Result<Self> {
        let mut event = Self::new(subspace_id, EventKind::Vote, content)?;
        event.set_vote(proposal_id, choice)?;
        Ok(event)
    }

    /// Invite `invitee` into the subspace
    pub fn invite(subspace_id: &str, invitee: &str, rules: Option<&str>, content: &str) -> Result<Self> {
        let mut event = Self::new(subspace_id, EventKind::Invite, content)?;
        event.set_invite(invitee, rules)?;
        Ok(event)
    }

    pub fn mint(subspace_id: &str, params: &MintParams, content: &str) -> Result<Self> {
        let mut event = Self::new(subspace_id, EventKind::Mint, content)?;
        event.set_mint(params)?;
        Ok(event)
    }

    /// Replace (or add) a single-valued tag
    fn set_tag(&mut self, key: &str, value: &str) {
        self.tags.retain(|tag| tag.first().map(String::as_str) != Some(key));
        self.tags.push(vec![key.to_string(), value.to_string()]);
    }

    pub fn set_parent(&mut self, parent_hash: &str) {
        let parent_hash = parent_hash.trim();
        if !parent_hash.is_empty() {
            self.set_tag("parent", parent_hash);
        }
    }

    pub fn set_content_type(&mut self, content_type: &str) {
        self.set_tag("content_type", content_type);
    }

    pub fn set_proposal(&mut self, proposal_id: &str, rules: &str) {
        self.set_tag("proposal_id", proposal_id);
        self.set_tag("rules", rules);
    }

    pub fn set_vote(&mut self, proposal_id: &str, choice: VoteChoice) -> Result<()> {
        let proposal_id = proposal_id.trim();
        if proposal_id.is_empty() {
            return Err(CoreError::MissingField("proposal_id"));
        }
        self.set_tag("proposal_id", proposal_id);
        self.set_tag("vote", choice.as_str());
        Ok(())
    }

    /// The `inviter_addr` tag carries the address being invited
    pub fn set_invite(&mut self, invitee: &str, rules: Option<&str>) -> Result<()> {
        let invitee = invitee.trim();
        if invitee.is_empty() {
            return Err(CoreError::MissingField("invitee"));
        }
        self.set_tag("inviter_addr", invitee);
        if let Some(rules) = rules.map(str::trim).filter(|rules| !rules.is_empty()) {
            self.set_tag("rules", rules);
        }
        Ok(())
    }

    pub fn set_mint(&mut self, params: &MintParams) -> Result<()> {
        if params.token_name.trim().is_empty() {
            return Err(CoreError::MissingField("token_name"));
        }
        if params.token_symbol.trim().is_empty() {
            return Err(CoreError::MissingField("token_symbol"));
        }
        self.set_tag("token_name", params.token_name.trim());
        self.set_tag("token_symbol", params.token_symbol.trim());
        self.set_tag("token_decimals", &params.token_decimals.to_string());
        self.set_tag("init_supply", &params.init_supply.to_string());
        self.set_tag("drop_ratio", &params.drop_ratio);
        Ok(())
    }

    pub fn to_unsigned(&self) -> UnsignedEvent {
        let mut tags: Tags = vec![
            vec!["d".into(), "subspace_op".into()],
            vec!["sid".into(), self.subspace_id.clone()],
            vec!["op".into(), self.op.op_name().into()],
        ];
        tags.extend(self.tags.iter().cloned());
        UnsignedEvent::new(self.op, tags, self.content.clone())
    }
}
