use kin_types::Did;
use serde::{Deserialize, Serialize};

/// Relationship between two participants, derived from which records exist.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RelationshipState {
    /// No record links the pair.
    Absent,
    /// `requester` has asked `recipient` and is waiting.
    Pending { requester: Did, recipient: Did },
    /// Each has a pending request from the other.
    MutuallyPending,
    /// Both `friends` records exist.
    Accepted,
    /// Only one side has a `friends` record: an acceptance stopped between
    /// its two writes.
    HalfAccepted { has_record: Did, missing_record: Did },
}

/// Result of checking one participant's friend list for symmetry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymmetryReport {
    pub user: Did,
    /// Friends whose reciprocal record was checked.
    pub friends_checked: usize,
    /// Friends of `user` that do not list `user` back.
    pub missing_reciprocal: Vec<Did>,
    /// Pending requests to `user` from participants already in its friend
    /// list: acceptances that never cleared their request.
    pub stale_pending: Vec<Did>,
}

impl SymmetryReport {
    pub fn is_consistent(&self) -> bool {
        self.missing_reciprocal.is_empty() && self.stale_pending.is_empty()
    }
}
