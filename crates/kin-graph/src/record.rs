use bytes::Bytes;
use kin_types::Did;
use serde::{Deserialize, Serialize};

use crate::error::{GraphError, GraphResult};
use crate::paths::{LogicalPath, Namespace};

/// Lifecycle status carried in a record body.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationshipStatus {
    Pending,
    Accepted,
}

impl RelationshipStatus {
    /// The status a record stored in `namespace` must carry.
    pub fn for_namespace(namespace: Namespace) -> Self {
        match namespace {
            Namespace::Pending => Self::Pending,
            Namespace::Friends => Self::Accepted,
        }
    }
}

/// JSON body stored at every relationship path.
///
/// `users` is `[owner, other]` of the path the record is written to. It is
/// kept as plain strings so that a body written by another client still
/// decodes and can be reported as a mismatch instead of a parse failure.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipRecord {
    pub users: Vec<String>,
    pub status: RelationshipStatus,
}

impl RelationshipRecord {
    /// The record that belongs at `path`.
    pub fn for_path(path: &LogicalPath) -> Self {
        Self {
            users: vec![path.owner.to_string(), path.other.to_string()],
            status: RelationshipStatus::for_namespace(path.namespace),
        }
    }

    pub fn encode(&self, key: &str) -> GraphResult<Bytes> {
        serde_json::to_vec(self)
            .map(Bytes::from)
            .map_err(|e| GraphError::MalformedRecord {
                path: key.to_string(),
                reason: e.to_string(),
            })
    }

    pub fn decode(key: &str, data: &[u8]) -> GraphResult<Self> {
        serde_json::from_slice(data).map_err(|e| GraphError::MalformedRecord {
            path: key.to_string(),
            reason: e.to_string(),
        })
    }

    /// Check the body against the path it was read from.
    ///
    /// The pair must name exactly the owner and the counterpart of the path
    /// (in either order) and the status must match the namespace.
    pub fn verify(&self, path: &LogicalPath, key: &str) -> GraphResult<()> {
        let mismatch = |reason: String| GraphError::RecordMismatch {
            path: key.to_string(),
            reason,
        };

        if !self.names_pair(&path.owner, &path.other) {
            return Err(mismatch(format!(
                "users {:?} do not match [{}, {}]",
                self.users, path.owner, path.other
            )));
        }
        let expected = RelationshipStatus::for_namespace(path.namespace);
        if self.status != expected {
            return Err(mismatch(format!(
                "status {:?} in {} namespace",
                self.status, path.namespace
            )));
        }
        Ok(())
    }

    fn names_pair(&self, a: &Did, b: &Did) -> bool {
        match self.users.as_slice() {
            [x, y] => (a == x.as_str() && b == y.as_str()) || (a == y.as_str() && b == x.as_str()),
            _ => false,
        }
    }
}
