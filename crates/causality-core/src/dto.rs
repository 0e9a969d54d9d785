//! Read-only aggregates served by the event index

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Per-subspace document kept by the index
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubspaceDetails {
    pub id: String,
    pub doc_type: String,
    pub subspace_id: String,
    /// Event count per kind, keyed by the kind number as a string (e.g. `"30300"`)
    pub keys: HashMap<String, u64>,
    /// Ids of events in the subspace
    pub events: Vec<String>,
    pub created: u64,
    pub updated: u64,
}

impl SubspaceDetails {
    pub fn count_for_kind(&self, kind: u16) -> u64 {
        self.keys.get(&kind.to_string()).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InvitedUser {
    pub user_id: String,
    pub subspace_id: String,
    pub timestamp: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserInvites {
    pub total_invited: u64,
    pub subspace_invited: HashMap<String, u64>,
    pub invited_users: HashMap<String, Vec<InvitedUser>>,
}

/// Event count per kind within one subspace
pub type SubspaceStats = HashMap<String, u64>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoteCounts {
    pub total_votes: u64,
    pub yes_votes: u64,
    pub no_votes: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoteStats {
    pub total_votes: u64,
    pub yes_votes: u64,
    pub no_votes: u64,
    pub subspace_votes: HashMap<String, VoteCounts>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserStats {
    pub id: String,
    pub doc_type: String,
    pub total_stats: HashMap<String, u64>,
    pub subspace_stats: HashMap<String, SubspaceStats>,
    pub created_subspaces: Vec<String>,
    pub joined_subspaces: Vec<String>,
    pub vote_stats: VoteStats,
    pub last_updated: u64,
}

impl UserStats {
    pub fn total_for_kind(&self, kind: u16) -> u64 {
        self.total_stats.get(&kind.to_string()).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_stats_decodes_partial_payload() {
        let json = r#"{
            "id": "0xabc",
            "total_stats": {"30301": 2, "30302": 5},
            "vote_stats": {"total_votes": 5, "yes_votes": 3, "no_votes": 2,
                           "subspace_votes": {"0x1": {"total_votes": 5, "yes_votes": 3, "no_votes": 2}}}
        }"#;
        let stats: UserStats = serde_json::from_str(json).unwrap();
        assert_eq!(stats.total_for_kind(30301), 2);
        assert_eq!(stats.total_for_kind(30303), 0);
        assert_eq!(stats.vote_stats.subspace_votes["0x1"].yes_votes, 3);
        assert!(stats.created_subspaces.is_empty());
    }

    #[test]
    fn test_subspace_details_counts() {
        let json = r#"{"id":"d","doc_type":"subspace","subspace_id":"0x1",
                       "keys":{"30300":2,"30301":1},"events":["a","b","c"],
                       "created":1,"updated":2}"#;
        let details: SubspaceDetails = serde_json::from_str(json).unwrap();
        assert_eq!(details.count_for_kind(30300), 2);
        assert_eq!(details.count_for_kind(30302), 0);
        assert_eq!(details.events.len(), 3);
    }
}
