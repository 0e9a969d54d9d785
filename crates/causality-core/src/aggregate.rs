//! View aggregation over indexed events
//!
//! Pure, single-pass transformations from raw event lists into the tallies, timelines
//! and cards the client displays. Nothing here is retained between calls.
//!
//! Proposals are identified by their event id: votes point at a proposal through their
//! `proposal_id` tag and comments through their `parent` tag.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dto::UserStats;
use crate::event::Event;
use crate::governance::VoteChoice;
use crate::kind::{EventKind, KIND_INVITE, KIND_PROPOSE, KIND_VOTE};

pub const UNNAMED_SUBSPACE: &str = "Unnamed Subspace";
pub const NO_DESCRIPTION: &str = "No description available";
pub const UNTITLED_PROPOSAL: &str = "Untitled Proposal";
const TITLE_MAX_CHARS: usize = 80;

// ----------------------------------------------------------------------------
// Vote Counting
// ----------------------------------------------------------------------------

/// Vote counts for one proposal or one event list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteTally {
    #[serde(rename = "for")]
    pub for_votes: u64,
    pub against: u64,
    /// Counted apart; never part of `for`/`against` or their percentages
    pub abstain: u64,
}

impl VoteTally {
    /// Decisive votes (`for` + `against`)
    pub fn total(&self) -> u64 {
        self.for_votes + self.against
    }

    /// Rounded share of `for` among decisive votes, 0 when there are none
    pub fn for_percentage(&self) -> u64 {
        percentage(self.for_votes, self.total())
    }

    pub fn against_percentage(&self) -> u64 {
        percentage(self.against, self.total())
    }

    fn record(&mut self, value: &str) {
        match value {
            "yes" => self.for_votes += 1,
            "no" => self.against += 1,
            "abstain" => self.abstain += 1,
            _ => {}
        }
    }
}

fn percentage(part: u64, total: u64) -> u64 {
    if total == 0 {
        0
    } else {
        ((part as f64 / total as f64) * 100.0).round() as u64
    }
}

/// Count `vote` tags over all vote-kind events
pub fn count_votes<'a>(events: impl IntoIterator<Item = &'a Event>) -> VoteTally {
    let mut tally = VoteTally::default();
    for event in events.into_iter().filter(|e| e.kind == KIND_VOTE) {
        if let Some(value) = event.tag("vote") {
            tally.record(value);
        }
    }
    tally
}

/// Count votes whose `proposal_id` tag names `proposal_id`
pub fn count_votes_for<'a>(
    proposal_id: &str,
    events: impl IntoIterator<Item = &'a Event>,
) -> VoteTally {
    count_votes(
        events
            .into_iter()
            .filter(|e| e.tag("proposal_id") == Some(proposal_id)),
    )
}

// ----------------------------------------------------------------------------
// Proposals, Comments, Voters
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub author: String,
    pub content: String,
    pub created_at: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voter {
    /// Id of the vote event
    pub id: String,
    pub address: String,
    pub vote: VoteChoice,
    pub created_at: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: String,
    pub subspace_id: Option<String>,
    pub title: String,
    pub content: String,
    pub author: String,
    pub created_at: u64,
    pub votes: VoteTally,
    pub comments: Vec<Comment>,
    pub voters: Vec<Voter>,
}

/// Stable sort, newest first
pub fn sort_newest_first<T>(items: &mut [T], created_at: impl Fn(&T) -> u64) {
    items.sort_by(|a, b| created_at(b).cmp(&created_at(a)));
}

fn proposal_text(event: &Event) -> (String, String) {
    if let Some(json) = event.content_json() {
        let field = |key: &str| json.get(key).and_then(Value::as_str).map(str::trim);
        let title = field("title").filter(|t| !t.is_empty());
        let body = field("description").or_else(|| field("content"));
        if title.is_some() || body.is_some() {
            return (
                title.unwrap_or(UNTITLED_PROPOSAL).to_string(),
                body.unwrap_or_default().to_string(),
            );
        }
    }

    let title = event
        .content
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(|line| line.chars().take(TITLE_MAX_CHARS).collect::<String>())
        .unwrap_or_else(|| UNTITLED_PROPOSAL.to_string());
    (title, event.content.clone())
}

fn to_proposal(event: &Event) -> Proposal {
    let (title, content) = proposal_text(event);
    Proposal {
        id: event.id.clone(),
        subspace_id: event.tag("sid").map(str::to_string),
        title,
        content,
        author: event.pubkey.clone(),
        created_at: event.created_at,
        votes: VoteTally::default(),
        comments: Vec::new(),
        voters: Vec::new(),
    }
}

/// Proposal events as bare proposals, newest first
pub fn proposal_timeline<'a>(events: impl IntoIterator<Item = &'a Event>) -> Vec<Proposal> {
    let mut proposals: Vec<Proposal> = events
        .into_iter()
        .filter(|e| e.kind == KIND_PROPOSE)
        .map(to_proposal)
        .collect();
    sort_newest_first(&mut proposals, |p| p.created_at);
    proposals
}

/// Posts whose `parent` tag is `proposal_id`, newest first
pub fn comments_for<'a>(
    proposal_id: &str,
    events: impl IntoIterator<Item = &'a Event>,
) -> Vec<Comment> {
    let mut comments: Vec<Comment> = events
        .into_iter()
        .filter(|e| e.is_kind(EventKind::Post) && e.tag("parent") == Some(proposal_id))
        .map(|e| Comment {
            id: e.id.clone(),
            author: e.pubkey.clone(),
            content: e.content.clone(),
            created_at: e.created_at,
        })
        .collect();
    sort_newest_first(&mut comments, |c| c.created_at);
    comments
}

/// Voters on `proposal_id`, newest first; unrecognized ballots are skipped
pub fn voters_for<'a>(
    proposal_id: &str,
    events: impl IntoIterator<Item = &'a Event>,
) -> Vec<Voter> {
    let mut voters: Vec<Voter> = events
        .into_iter()
        .filter(|e| e.kind == KIND_VOTE && e.tag("proposal_id") == Some(proposal_id))
        .filter_map(|e| {
            let vote = match e.tag("vote")? {
                "yes" => VoteChoice::Yes,
                "no" => VoteChoice::No,
                "abstain" => VoteChoice::Abstain,
                _ => return None,
            };
            Some(Voter {
                id: e.id.clone(),
                address: e.pubkey.clone(),
                vote,
                created_at: e.created_at,
            })
        })
        .collect();
    sort_newest_first(&mut voters, |v| v.created_at);
    voters
}

/// Proposals joined with their votes, voters and comments, newest first
pub fn build_proposals(events: &[Event]) -> Vec<Proposal> {
    proposal_timeline(events)
        .into_iter()
        .map(|mut proposal| {
            proposal.votes = count_votes_for(&proposal.id, events);
            proposal.voters = voters_for(&proposal.id, events);
            proposal.comments = comments_for(&proposal.id, events);
            proposal
        })
        .collect()
}

// ----------------------------------------------------------------------------
// Subspace Cards
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubspaceCard {
    /// `sid` tag of the creation event, or its event id when untagged
    pub id: String,
    pub name: String,
    pub description: String,
    pub image: String,
    pub proposals: u64,
    pub posts: u64,
    pub created_at: u64,
}

/// Subspace listing built from creation events, in input order
pub fn subspace_cards(events: &[Event]) -> Vec<SubspaceCard> {
    events
        .iter()
        .filter(|e| e.is_kind(EventKind::SubspaceCreate) && e.has_tag("d", "subspace_create"))
        .map(|event| {
            let id = event.tag("sid").unwrap_or(&event.id).to_string();
            let content = event.content_json();
            let field = |key: &str| {
                content
                    .as_ref()
                    .and_then(|c| c.get(key))
                    .and_then(Value::as_str)
                    .filter(|value| !value.is_empty())
                    .map(str::to_string)
            };
            let count = |kind: EventKind| {
                events
                    .iter()
                    .filter(|e| e.is_kind(kind) && e.tag("sid") == Some(id.as_str()))
                    .count() as u64
            };

            SubspaceCard {
                name: event
                    .tag("subspace_name")
                    .unwrap_or(UNNAMED_SUBSPACE)
                    .to_string(),
                description: field("desc").unwrap_or_else(|| NO_DESCRIPTION.to_string()),
                image: field("img_url")
                    .unwrap_or_else(|| crate::subspace::DEFAULT_IMAGE_URL.to_string()),
                proposals: count(EventKind::Propose),
                posts: count(EventKind::Post),
                created_at: event.created_at,
                id,
            }
        })
        .collect()
}

/// Events carrying `sid` = `subspace_id`
pub fn events_in_subspace<'a>(subspace_id: &str, events: &'a [Event]) -> Vec<&'a Event> {
    events
        .iter()
        .filter(|e| e.tag("sid") == Some(subspace_id))
        .collect()
}

// ----------------------------------------------------------------------------
// Participation
// ----------------------------------------------------------------------------

/// Profile summary derived from the index's user statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipationStats {
    /// Subspaces created or joined
    pub total_keys: u64,
    pub proposal_count: u64,
    pub vote_count: u64,
    pub invite_count: u64,
}

impl From<&UserStats> for ParticipationStats {
    fn from(stats: &UserStats) -> Self {
        Self {
            total_keys: (stats.created_subspaces.len() + stats.joined_subspaces.len()) as u64,
            proposal_count: stats.total_for_kind(KIND_PROPOSE),
            vote_count: stats.total_for_kind(KIND_VOTE),
            invite_count: stats.total_for_kind(KIND_INVITE),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(id: &str, kind: u16, created_at: u64, tags: &[(&str, &str)], content: &str) -> Event {
        Event {
            id: id.to_string(),
            pubkey: format!("author-{}", id),
            created_at,
            kind,
            content: content.to_string(),
            tags: tags
                .iter()
                .map(|(k, v)| vec![k.to_string(), v.to_string()])
                .collect(),
            sig: String::new(),
        }
    }

    #[test]
    fn test_vote_tally_ignores_unknown_values() {
        let events = vec![
            event("1", KIND_VOTE, 1, &[("vote", "yes")], ""),
            event("2", KIND_VOTE, 2, &[("vote", "no")], ""),
            event("3", KIND_VOTE, 3, &[("vote", "yes")], ""),
            event("4", KIND_VOTE, 4, &[("vote", "maybe")], ""),
            event("5", KIND_VOTE, 5, &[("vote", "abstain")], ""),
            event("6", KIND_PROPOSE, 6, &[("vote", "yes")], ""),
        ];
        let tally = count_votes(&events);
        assert_eq!(tally.for_votes, 2);
        assert_eq!(tally.against, 1);
        assert_eq!(tally.abstain, 1);
        assert_eq!(tally.total(), 3);
        assert_eq!(tally.for_percentage(), 67);
        assert_eq!(tally.against_percentage(), 33);
        assert_eq!(VoteTally::default().for_percentage(), 0);
    }

    #[test]
    fn test_proposal_title_from_json_or_text() {
        let json = event("p1", KIND_PROPOSE, 1, &[], r#"{"title":"Budget","description":"Raise it"}"#);
        let text = event("p2", KIND_PROPOSE, 2, &[], "\n  First line\nSecond line");
        let empty = event("p3", KIND_PROPOSE, 3, &[], "");

        let timeline = proposal_timeline([&json, &text, &empty]);
        assert_eq!(timeline[0].title, UNTITLED_PROPOSAL);
        assert_eq!(timeline[1].title, "First line");
        assert_eq!(timeline[2].title, "Budget");
        assert_eq!(timeline[2].content, "Raise it");
    }

    #[test]
    fn test_build_proposals_links_votes_and_comments() {
        let events = vec![
            event("p1", KIND_PROPOSE, 10, &[("sid", "s")], "first"),
            event("p2", KIND_PROPOSE, 20, &[("sid", "s")], "second"),
            event("v1", KIND_VOTE, 11, &[("proposal_id", "p1"), ("vote", "yes")], ""),
            event("v2", KIND_VOTE, 12, &[("proposal_id", "p1"), ("vote", "no")], ""),
            event("v3", KIND_VOTE, 21, &[("proposal_id", "p2"), ("vote", "yes")], ""),
            event("c1", 30300, 13, &[("parent", "p1")], "agree"),
            event("c2", 30300, 14, &[("parent", "p1")], "disagree"),
        ];

        let proposals = build_proposals(&events);
        assert_eq!(proposals.len(), 2);
        assert_eq!(proposals[0].id, "p2");
        assert_eq!(proposals[0].votes.for_votes, 1);

        let p1 = &proposals[1];
        assert_eq!(p1.votes, VoteTally { for_votes: 1, against: 1, abstain: 0 });
        assert_eq!(p1.voters.len(), 2);
        assert_eq!(p1.voters[0].id, "v2");
        assert_eq!(p1.comments.iter().map(|c| c.id.as_str()).collect::<Vec<_>>(), ["c2", "c1"]);
    }

    #[test]
    fn test_subspace_cards_defaults_and_counts() {
        let events = vec![
            event(
                "e1",
                30100,
                1,
                &[("d", "subspace_create"), ("sid", "s1"), ("subspace_name", "AI")],
                r#"{"desc":"research","img_url":"https://img"}"#,
            ),
            event("e2", 30100, 2, &[("d", "subspace_create")], "not json"),
            event("e3", 30100, 3, &[("d", "other")], ""),
            event("p", KIND_PROPOSE, 4, &[("sid", "s1")], ""),
            event("q", 30300, 5, &[("sid", "s1")], ""),
            event("r", 30300, 6, &[("sid", "s1")], ""),
        ];
        let cards = subspace_cards(&events);
        assert_eq!(cards.len(), 2);
        assert_eq!(cards[0].id, "s1");
        assert_eq!(cards[0].name, "AI");
        assert_eq!(cards[0].description, "research");
        assert_eq!(cards[0].proposals, 1);
        assert_eq!(cards[0].posts, 2);

        assert_eq!(cards[1].id, "e2");
        assert_eq!(cards[1].name, UNNAMED_SUBSPACE);
        assert_eq!(cards[1].description, NO_DESCRIPTION);
        assert_eq!(cards[1].image, "/image.png");
    }

    #[test]
    fn test_participation_stats() {
        let mut stats = UserStats::default();
        stats.created_subspaces = vec!["a".into()];
        stats.joined_subspaces = vec!["b".into(), "c".into()];
        stats.total_stats.insert("30301".into(), 4);
        stats.total_stats.insert("30302".into(), 9);
        stats.total_stats.insert("30303".into(), 2);

        let summary = ParticipationStats::from(&stats);
        assert_eq!(summary.total_keys, 3);
        assert_eq!(summary.proposal_count, 4);
        assert_eq!(summary.vote_count, 9);
        assert_eq!(summary.invite_count, 2);
    }
}
