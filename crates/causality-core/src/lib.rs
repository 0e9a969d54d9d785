//! Causality Core
//!
//! Event model and protocol builders for subspace governance: subspace creation and
//! membership, posts, proposals, votes, invites and mint requests. Also carries wallet
//! signature recovery, the read-only DTOs served by the event index, and the pure view
//! aggregation (vote tallies, proposal timelines, subspace cards, invite graphs) used by
//! the client.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod aggregate;
pub mod dto;
pub mod error;
pub mod event;
pub mod governance;
pub mod graph;
pub mod kind;
pub mod subspace;
pub mod wallet;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use aggregate::{
    build_proposals, count_votes, count_votes_for, subspace_cards, Comment,
    ParticipationStats, Proposal, SubspaceCard, VoteTally, Voter,
};
pub use dto::{InvitedUser, SubspaceDetails, UserInvites, UserStats, VoteStats};
pub use error::{CoreError, Result};
pub use event::{Event, Tags, UnsignedEvent};
pub use governance::{GovernanceEvent, MintParams, ProposalContent, VoteChoice};
pub use graph::{GraphLink, GraphNode, GraphTotal, InviteGraph, NodeCategory};
pub use kind::EventKind;
pub use subspace::{calculate_subspace_id, SubspaceCreate, SubspaceJoin, SubspaceTemplate};
pub use wallet::{recover_address, LocalWallet, MessageSigner};
