//! The storage path convention.
//!
//! ```text
//! <root>/<ownerDid>/<namespace>/<otherDid>.json
//! ```
//!
//! The filename is the source of truth for the other participant's identity.
//! Listings never read record bodies; a body is only compared against its
//! path as a consistency check when it is fetched for another reason.

use std::fmt;

use kin_types::Did;
use serde::{Deserialize, Serialize};

/// Root directory of every relationship path.
pub const DEFAULT_ROOT: &str = "friendships";

const RECORD_SUFFIX: &str = ".json";

/// The per-owner directory a record lives in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    /// Requests received by the owner, keyed by requester.
    Pending,
    /// Accepted relationships of the owner, keyed by friend.
    Friends,
}

impl Namespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Friends => "friends",
        }
    }

    fn from_segment(segment: &str) -> Option<Self> {
        match segment {
            "pending" => Some(Self::Pending),
            "friends" => Some(Self::Friends),
            _ => None,
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One record location: whose namespace, which directory, which counterpart.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LogicalPath {
    pub owner: Did,
    pub namespace: Namespace,
    pub other: Did,
}

impl LogicalPath {
    /// `other`'s request to `owner`, stored in `owner`'s namespace.
    pub fn pending(owner: &Did, other: &Did) -> Self {
        Self {
            owner: owner.clone(),
            namespace: Namespace::Pending,
            other: other.clone(),
        }
    }

    /// `owner`'s record of being friends with `other`.
    pub fn friends(owner: &Did, other: &Did) -> Self {
        Self {
            owner: owner.clone(),
            namespace: Namespace::Friends,
            other: other.clone(),
        }
    }

    /// The storage key under `root`.
    pub fn render(&self, root: &str) -> String {
        format!(
            "{}{}{}",
            namespace_prefix(root, &self.owner, self.namespace),
            self.other,
            RECORD_SUFFIX
        )
    }

    /// Parse a storage key under `root` back into its parts.
    pub fn parse(root: &str, key: &str) -> Option<Self> {
        let rest = key.strip_prefix(root)?.strip_prefix('/')?;
        let (owner, rest) = rest.split_once('/')?;
        let (namespace, file) = rest.split_once('/')?;
        Some(Self {
            owner: Did::parse(owner).ok()?,
            namespace: Namespace::from_segment(namespace)?,
            other: other_from_filename(file)?,
        })
    }
}

/// Directory prefix listing every record `owner` has in `namespace`.
pub fn namespace_prefix(root: &str, owner: &Did, namespace: Namespace) -> String {
    format!("{root}/{owner}/{namespace}/")
}

/// Extract the counterpart identity from a key listed under `prefix`.
///
/// Returns `None` for keys outside the convention: nested keys, keys
/// without the record suffix, or filenames that are not valid DIDs.
pub fn other_party(prefix: &str, key: &str) -> Option<Did> {
    other_from_filename(key.strip_prefix(prefix)?)
}

fn other_from_filename(file: &str) -> Option<Did> {
    let did = file.strip_suffix(RECORD_SUFFIX)?;
    Did::parse(did).ok()
}
