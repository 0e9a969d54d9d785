//! Invitation graph
//!
//! Nodes are addresses, links point from inviter to invitee. The root user is the
//! `Center` node; everyone reached through invitations is a `Referral`. Addresses are
//! compared without `0x` and case-insensitively.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::dto::UserInvites;
use crate::event::{strip_hex_prefix, Event};
use crate::kind::EventKind;

const CENTER_SYMBOL_SIZE: u32 = 30;
const MIN_SYMBOL_SIZE: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeCategory {
    Center,
    Referrals,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    pub id: String,
    pub name: String,
    pub category: NodeCategory,
    /// Direct invitees of this node; for the center, everyone reached
    pub value: u64,
    pub symbol_size: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphLink {
    pub source: String,
    pub target: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphTotal {
    pub direct_inviter_count: u64,
    pub indirect_invite_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InviteGraph {
    pub total: GraphTotal,
    pub nodes: Vec<GraphNode>,
    pub links: Vec<GraphLink>,
}

fn normalize(address: &str) -> String {
    strip_hex_prefix(address.trim()).to_ascii_lowercase()
}

/// 10 for one invitee, growing with each doubling, capped at the center size
fn symbol_size(value: u64) -> u32 {
    if value == 0 {
        return MIN_SYMBOL_SIZE;
    }
    let doublings = u64::BITS - 1 - value.leading_zeros();
    (MIN_SYMBOL_SIZE + 5 * doublings).min(CENTER_SYMBOL_SIZE)
}

fn referral(id: String, value: u64) -> GraphNode {
    GraphNode {
        name: id.clone(),
        id,
        category: NodeCategory::Referrals,
        value,
        symbol_size: symbol_size(value),
    }
}

impl InviteGraph {
    fn center(root: &str, reached: u64) -> GraphNode {
        GraphNode {
            id: root.to_string(),
            name: root.to_string(),
            category: NodeCategory::Center,
            value: reached,
            symbol_size: CENTER_SYMBOL_SIZE,
        }
    }

    /// One-level graph from the index's invite summary.
    ///
    /// An address invited into several subspaces appears once.
    pub fn from_invites(user: &str, invites: &UserInvites) -> Self {
        let root = normalize(user);

        let mut subspaces: Vec<&String> = invites.invited_users.keys().collect();
        subspaces.sort();

        let mut seen = HashSet::new();
        let mut invitees = Vec::new();
        for sid in subspaces {
            for invited in &invites.invited_users[sid] {
                let id = normalize(&invited.user_id);
                if !id.is_empty() && id != root && seen.insert(id.clone()) {
                    invitees.push(id);
                }
            }
        }

        let direct = invitees.len() as u64;
        let mut nodes = vec![Self::center(&root, direct)];
        let mut links = Vec::with_capacity(invitees.len());
        for id in invitees {
            links.push(GraphLink {
                source: root.clone(),
                target: id.clone(),
            });
            nodes.push(referral(id, 0));
        }

        Self {
            total: GraphTotal {
                direct_inviter_count: direct,
                indirect_invite_count: 0,
            },
            nodes,
            links,
        }
    }

    /// Multi-level graph from raw invite events, walked breadth-first from `root`.
    ///
    /// Each event links its signer to the address in its `inviter_addr` tag. Addresses
    /// not reachable from the root are left out; an address is attached to the first
    /// inviter that reaches it.
    pub fn from_events<'a>(root: &str, events: impl IntoIterator<Item = &'a Event>) -> Self {
        let root = normalize(root);

        let mut edges: HashMap<String, Vec<String>> = HashMap::new();
        for event in events.into_iter().filter(|e| e.is_kind(EventKind::Invite)) {
            let Some(invitee) = event.tag("inviter_addr").map(normalize) else {
                continue;
            };
            let inviter = normalize(&event.pubkey);
            if invitee.is_empty() || invitee == inviter {
                continue;
            }
            let targets = edges.entry(inviter).or_default();
            if !targets.contains(&invitee) {
                targets.push(invitee);
            }
        }

        let mut visited: HashSet<String> = HashSet::from([root.clone()]);
        let mut queue = VecDeque::from([(root.clone(), 0usize)]);
        let mut links = Vec::new();
        let mut reached: Vec<(String, u64)> = Vec::new();
        let mut total = GraphTotal::default();

        while let Some((node, depth)) = queue.pop_front() {
            let mut children = 0;
            for target in edges.get(&node).into_iter().flatten() {
                if !visited.insert(target.clone()) {
                    continue;
                }
                children += 1;
                if depth == 0 {
                    total.direct_inviter_count += 1;
                } else {
                    total.indirect_invite_count += 1;
                }
                links.push(GraphLink {
                    source: node.clone(),
                    target: target.clone(),
                });
                queue.push_back((target.clone(), depth + 1));
            }
            if depth > 0 {
                reached.push((node, children));
            }
        }

        let everyone = total.direct_inviter_count + total.indirect_invite_count;
        let mut nodes = vec![Self::center(&root, everyone)];
        nodes.extend(reached.into_iter().map(|(id, value)| referral(id, value)));

        Self { total, nodes, links }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::dto::InvitedUser;

    fn invite(from: &str, to: &str) -> Event {
        Event {
            id: format!("{}-{}", from, to),
            pubkey: from.to_string(),
            created_at: 0,
            kind: EventKind::Invite.as_u16(),
            content: String::new(),
            tags: vec![vec!["inviter_addr".to_string(), to.to_string()]],
            sig: String::new(),
        }
    }

    #[test]
    fn test_graph_from_events() {
        let events = vec![
            invite("aa", "0xBB"),
            invite("aa", "cc"),
            invite("bb", "dd"),
            invite("cc", "ee"),
            invite("cc", "bb"),
            invite("zz", "yy"),
        ];
        let graph = InviteGraph::from_events("0xAA", &events);

        assert_eq!(graph.total.direct_inviter_count, 2);
        assert_eq!(graph.total.indirect_invite_count, 2);
        assert_eq!(graph.nodes.len(), 5);
        assert_eq!(graph.links.len(), 4);

        let center = &graph.nodes[0];
        assert_eq!(center.id, "aa");
        assert_eq!(center.category, NodeCategory::Center);
        assert_eq!(center.value, 4);

        let cc = graph.nodes.iter().find(|n| n.id == "cc").unwrap();
        assert_eq!(cc.value, 1);
        assert!(graph.nodes.iter().all(|n| n.id != "zz"));
    }

    #[test]
    fn test_graph_from_invites_dedupes() {
        let mut invited_users = HashMap::new();
        invited_users.insert(
            "0x1".to_string(),
            vec![
                InvitedUser { user_id: "0xB".into(), subspace_id: "0x1".into(), timestamp: 1 },
                InvitedUser { user_id: "c".into(), subspace_id: "0x1".into(), timestamp: 2 },
            ],
        );
        invited_users.insert(
            "0x2".to_string(),
            vec![InvitedUser { user_id: "b".into(), subspace_id: "0x2".into(), timestamp: 3 }],
        );
        let invites = UserInvites {
            total_invited: 3,
            subspace_invited: HashMap::new(),
            invited_users,
        };

        let graph = InviteGraph::from_invites("0xA", &invites);
        assert_eq!(graph.total.direct_inviter_count, 2);
        assert_eq!(graph.total.indirect_invite_count, 0);
        assert_eq!(graph.nodes.len(), 3);
        assert!(graph.links.iter().all(|l| l.source == "a"));
    }

    #[test]
    fn test_symbol_size_scale() {
        assert_eq!(symbol_size(0), 10);
        assert_eq!(symbol_size(1), 10);
        assert_eq!(symbol_size(2), 15);
        assert_eq!(symbol_size(4), 20);
        assert_eq!(symbol_size(1 << 20), 30);
    }

    #[test]
    fn test_graph_serializes_camel_case() {
        let graph = InviteGraph::from_events("a", std::iter::empty());
        let json = serde_json::to_value(&graph).unwrap();
        assert_eq!(json["total"]["directInviterCount"], 0);
        assert_eq!(json["nodes"][0]["category"], "Center");
        assert_eq!(json["nodes"][0]["symbolSize"], 30);
    }
}
