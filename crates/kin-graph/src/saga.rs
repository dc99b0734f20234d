//! The accept saga.
//!
//! Accepting a request touches three independent paths. The steps run in a
//! fixed order, each only after the backend acknowledged the previous one:
//!
//! 1. write `friends/<requester>.json` in the accepter's namespace
//! 2. write `friends/<accepter>.json` in the requester's namespace
//! 3. delete `pending/<requester>.json` from the accepter's namespace
//!
//! Every step is idempotent, so an interrupted saga can be resumed from its
//! [`AcceptProgress`] marker by re-running the steps it has not completed.

use std::fmt;

use kin_types::{ContentId, Did};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::paths::LogicalPath;

/// One step of the accept saga.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcceptStep {
    WriteAccepterFriends,
    WriteRequesterFriends,
    DeletePending,
}

impl AcceptStep {
    /// Every step, in execution order.
    pub const ALL: [AcceptStep; 3] = [
        Self::WriteAccepterFriends,
        Self::WriteRequesterFriends,
        Self::DeletePending,
    ];

    /// The path this step writes or deletes.
    pub fn target(&self, accepter: &Did, requester: &Did) -> LogicalPath {
        match self {
            Self::WriteAccepterFriends => LogicalPath::friends(accepter, requester),
            Self::WriteRequesterFriends => LogicalPath::friends(requester, accepter),
            Self::DeletePending => LogicalPath::pending(accepter, requester),
        }
    }
}

impl fmt::Display for AcceptStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WriteAccepterFriends => write!(f, "write-accepter-friends"),
            Self::WriteRequesterFriends => write!(f, "write-requester-friends"),
            Self::DeletePending => write!(f, "delete-pending"),
        }
    }
}

/// Step-completion marker of one acceptance.
///
/// Serializable so callers can persist it when
/// [`GraphError::PartialAcceptance`](crate::GraphError::PartialAcceptance)
/// surfaces and finish the saga later.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptProgress {
    pub saga_id: Uuid,
    pub accepter: Did,
    pub requester: Did,
    pub completed: Vec<AcceptStep>,
}

impl AcceptProgress {
    /// A fresh marker with no step completed.
    pub fn new(accepter: Did, requester: Did) -> Self {
        Self {
            saga_id: Uuid::now_v7(),
            accepter,
            requester,
            completed: Vec::new(),
        }
    }

    pub fn has_completed(&self, step: AcceptStep) -> bool {
        self.completed.contains(&step)
    }

    /// Steps still to run, in execution order.
    pub fn remaining(&self) -> Vec<AcceptStep> {
        AcceptStep::ALL
            .into_iter()
            .filter(|step| !self.has_completed(*step))
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.remaining().is_empty()
    }

    /// Returns `true` if some but not all steps have run.
    pub fn is_partial(&self) -> bool {
        !self.completed.is_empty() && !self.is_complete()
    }

    pub(crate) fn mark(&mut self, step: AcceptStep) {
        if !self.has_completed(step) {
            self.completed.push(step);
        }
    }
}

impl fmt::Display for AcceptProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "acceptance {} ({} accepting {}, {}/{} steps done)",
            self.saga_id,
            self.accepter,
            self.requester,
            self.completed.len(),
            AcceptStep::ALL.len()
        )
    }
}

/// A record written by a relationship operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrittenRecord {
    /// Storage key of the record.
    pub path: String,
    /// Content id from the backend acknowledgement, when it carried one.
    pub content_id: Option<ContentId>,
}

/// Outcome of a completed acceptance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptReceipt {
    pub progress: AcceptProgress,
    /// Records written by this call. A resumed saga lists only the writes it
    /// re-ran.
    pub written: Vec<WrittenRecord>,
}
