use async_trait::async_trait;
use bytes::Bytes;
use kin_types::ContentId;

use crate::error::StoreResult;
use crate::object::{DeleteReceipt, ObjectEntry, ObjectMetadata, PutReceipt};

/// Client for a path-keyed, content-pinning object store.
///
/// All implementations must satisfy these invariants:
/// - A write to a path supersedes earlier writes to the same path, and the
///   new bytes are pinned under a new immutable content identifier.
/// - Content identifiers may be published after `put` returns. Until then,
///   `head_metadata` reports the object with `content_id: None`.
/// - Bytes pinned under a content identifier stay fetchable after the path
///   that produced them is overwritten or deleted.
/// - Transport and authentication failures surface as errors; a missing
///   path is not an error.
#[async_trait]
pub trait ObjectStoreClient: Send + Sync {
    /// Write `content` at `path`, replacing any previous object.
    async fn put(&self, path: &str, content: Bytes) -> StoreResult<PutReceipt>;

    /// Look up the metadata of the object at `path`.
    ///
    /// Returns `Ok(None)` if no object exists at the path.
    async fn head_metadata(&self, path: &str) -> StoreResult<Option<ObjectMetadata>>;

    /// Fetch the bytes pinned under a content identifier.
    async fn fetch_by_content_id(&self, id: &ContentId) -> StoreResult<Bytes>;

    /// List every object whose path starts with `prefix`, sorted by key.
    async fn list(&self, prefix: &str) -> StoreResult<Vec<ObjectEntry>>;

    /// Remove the object at `path`. Deleting a missing path succeeds with
    /// `success: false`.
    async fn delete(&self, path: &str) -> StoreResult<DeleteReceipt>;
}
