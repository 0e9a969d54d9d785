//! Event kind numbers used by the subspace governance protocol

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

pub const KIND_SUBSPACE_CREATE: u16 = 30100;
pub const KIND_SUBSPACE_JOIN: u16 = 30200;
pub const KIND_POST: u16 = 30300;
pub const KIND_PROPOSE: u16 = 30301;
pub const KIND_VOTE: u16 = 30302;
pub const KIND_INVITE: u16 = 30303;
pub const KIND_MINT: u16 = 30304;

/// Semantic type selected by an event's `kind` integer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum EventKind {
    SubspaceCreate,
    SubspaceJoin,
    Post,
    Propose,
    Vote,
    Invite,
    Mint,
}

impl EventKind {
    /// All governance kinds, in protocol order
    pub const ALL: [EventKind; 7] = [
        EventKind::SubspaceCreate,
        EventKind::SubspaceJoin,
        EventKind::Post,
        EventKind::Propose,
        EventKind::Vote,
        EventKind::Invite,
        EventKind::Mint,
    ];

    pub const fn as_u16(self) -> u16 {
        match self {
            EventKind::SubspaceCreate => KIND_SUBSPACE_CREATE,
            EventKind::SubspaceJoin => KIND_SUBSPACE_JOIN,
            EventKind::Post => KIND_POST,
            EventKind::Propose => KIND_PROPOSE,
            EventKind::Vote => KIND_VOTE,
            EventKind::Invite => KIND_INVITE,
            EventKind::Mint => KIND_MINT,
        }
    }

    /// Operation name used in `op` tags and `ops` lists
    pub const fn op_name(self) -> &'static str {
        match self {
            EventKind::SubspaceCreate => "subspace_create",
            EventKind::SubspaceJoin => "subspace_join",
            EventKind::Post => "post",
            EventKind::Propose => "propose",
            EventKind::Vote => "vote",
            EventKind::Invite => "invite",
            EventKind::Mint => "mint",
        }
    }
}

impl TryFrom<u16> for EventKind {
    type Error = CoreError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        EventKind::ALL
            .into_iter()
            .find(|kind| kind.as_u16() == value)
            .ok_or(CoreError::UnknownKind(value))
    }
}

impl From<EventKind> for u16 {
    fn from(kind: EventKind) -> Self {
        kind.as_u16()
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.op_name(), self.as_u16())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trip_through_u16() {
        for kind in EventKind::ALL {
            assert_eq!(EventKind::try_from(kind.as_u16()).unwrap(), kind);
        }
        assert!(matches!(EventKind::try_from(1), Err(CoreError::UnknownKind(1))));
    }
}
