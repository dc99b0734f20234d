use chrono::{DateTime, Utc};
use kin_types::ContentId;
use serde::{Deserialize, Serialize};

/// Backend acknowledgement of a `put`.
///
/// The content identifier is assigned asynchronously and is frequently
/// absent from the acknowledgement itself.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PutReceipt {
    pub content_id: Option<ContentId>,
}

/// Metadata attached to an existing object.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMetadata {
    /// Side-channel content identifier. `None` until the backend has
    /// published it.
    pub content_id: Option<ContentId>,
    /// Size of the stored bytes.
    pub size: u64,
    /// When the path was last written.
    pub last_modified: DateTime<Utc>,
}

/// One entry of a prefix listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectEntry {
    /// Full logical path of the object.
    pub key: String,
    pub last_modified: DateTime<Utc>,
    pub size: u64,
}

/// Backend acknowledgement of a `delete`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteReceipt {
    /// `true` if an object existed at the path and was removed.
    pub success: bool,
}

/// The backend operations, used to target fault injection and to record
/// the operation log of the in-memory store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StoreOp {
    Put,
    HeadMetadata,
    FetchByContentId,
    List,
    Delete,
}

impl StoreOp {
    /// Returns `true` for operations that mutate the backend.
    pub fn is_write(&self) -> bool {
        matches!(self, Self::Put | Self::Delete)
    }
}

impl std::fmt::Display for StoreOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Put => write!(f, "put"),
            Self::HeadMetadata => write!(f, "head"),
            Self::FetchByContentId => write!(f, "fetch"),
            Self::List => write!(f, "list"),
            Self::Delete => write!(f, "delete"),
        }
    }
}
