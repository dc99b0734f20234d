use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use kin_types::ContentId;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::object::{DeleteReceipt, ObjectEntry, ObjectMetadata, PutReceipt, StoreOp};
use crate::traits::ObjectStoreClient;

/// How long a written path's content identifier stays unpublished.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PropagationLag {
    /// Published immediately and returned on the `put` receipt.
    #[default]
    Immediate,
    /// Hidden for the next `n` metadata lookups of the path, then published.
    /// The `put` receipt never carries it.
    Polls(u32),
    /// Never published.
    Never,
}

/// Failure to raise from an injected fault.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FaultKind {
    Transport,
    Unauthorized,
    Backend,
}

/// One backend call observed by the in-memory store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedOp {
    pub op: StoreOp,
    /// Path, prefix, or content identifier the call targeted.
    pub target: String,
}

#[derive(Clone, Debug)]
struct PathEntry {
    content_id: ContentId,
    size: u64,
    last_modified: DateTime<Utc>,
    /// Lookups left before the identifier is published; `None` = never.
    hidden_for: Option<u32>,
}

impl PathEntry {
    fn metadata(&self) -> ObjectMetadata {
        ObjectMetadata {
            content_id: (self.hidden_for == Some(0)).then(|| self.content_id.clone()),
            size: self.size,
            last_modified: self.last_modified,
        }
    }
}

#[derive(Clone, Debug)]
struct Fault {
    op: StoreOp,
    target: String,
    kind: FaultKind,
}

#[derive(Default)]
struct State {
    paths: BTreeMap<String, PathEntry>,
    blobs: HashMap<ContentId, Bytes>,
    faults: Vec<Fault>,
    log: Vec<RecordedOp>,
}

impl State {
    /// Record the call and fire a matching one-shot fault, if any.
    fn enter(&mut self, op: StoreOp, target: &str) -> StoreResult<()> {
        self.log.push(RecordedOp {
            op,
            target: target.to_string(),
        });
        let Some(pos) = self
            .faults
            .iter()
            .position(|f| f.op == op && f.target == target)
        else {
            return Ok(());
        };
        let fault = self.faults.remove(pos);
        debug!(%op, key = target, kind = ?fault.kind, "injected fault fired");
        let message = format!("injected failure on {op} {target}");
        Err(match fault.kind {
            FaultKind::Transport => StoreError::Transport(message),
            FaultKind::Unauthorized => StoreError::Unauthorized(message),
            FaultKind::Backend => StoreError::Backend(message),
        })
    }
}

/// In-memory object store with simulated metadata propagation.
///
/// Intended for tests and embedding. Content identifiers are derived from
/// the stored bytes, so identical writes share one identifier. The
/// [`PropagationLag`] decides when a written path's identifier becomes
/// visible through [`ObjectStoreClient::head_metadata`]; faults can be
/// injected per operation and target; every call is logged.
pub struct InMemoryObjectStore {
    state: Mutex<State>,
    lag: PropagationLag,
}

impl InMemoryObjectStore {
    /// Create an empty store that publishes identifiers immediately.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            lag: PropagationLag::Immediate,
        }
    }

    /// Set the propagation lag applied to subsequent writes.
    pub fn with_propagation_lag(mut self, lag: PropagationLag) -> Self {
        self.lag = lag;
        self
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|e| StoreError::Backend(format!("lock poisoned: {e}")))
    }

    /// Make the next `op` against `target` fail with `kind`. One-shot.
    pub fn inject_fault(&self, op: StoreOp, target: impl Into<String>, kind: FaultKind) {
        if let Ok(mut state) = self.lock() {
            state.faults.push(Fault {
                op,
                target: target.into(),
                kind,
            });
        }
    }

    /// Publish every pending content identifier now.
    pub fn publish_all(&self) {
        if let Ok(mut state) = self.lock() {
            for entry in state.paths.values_mut() {
                entry.hidden_for = Some(0);
            }
        }
    }

    /// Every call observed so far, oldest first.
    pub fn operations(&self) -> Vec<RecordedOp> {
        self.lock().map(|s| s.log.clone()).unwrap_or_default()
    }

    /// Number of `put` and `delete` calls observed so far.
    pub fn write_count(&self) -> usize {
        self.lock()
            .map(|s| s.log.iter().filter(|r| r.op.is_write()).count())
            .unwrap_or_default()
    }

    /// Forget the operation log.
    pub fn clear_operations(&self) {
        if let Ok(mut state) = self.lock() {
            state.log.clear();
        }
    }

    /// Current bytes at `path`, bypassing propagation and the log.
    pub fn peek(&self, path: &str) -> Option<Bytes> {
        let state = self.lock().ok()?;
        let entry = state.paths.get(path)?;
        state.blobs.get(&entry.content_id).cloned()
    }

    /// Returns `true` if an object exists at `path`.
    pub fn contains(&self, path: &str) -> bool {
        self.lock()
            .map(|s| s.paths.contains_key(path))
            .unwrap_or(false)
    }

    /// Number of paths currently holding an object.
    pub fn len(&self) -> usize {
        self.lock().map(|s| s.paths.len()).unwrap_or_default()
    }

    /// Returns `true` if no path holds an object.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sorted list of every path currently holding an object.
    pub fn paths(&self) -> Vec<String> {
        self.lock()
            .map(|s| s.paths.keys().cloned().collect())
            .unwrap_or_default()
    }
}

impl Default for InMemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStoreClient for InMemoryObjectStore {
    async fn put(&self, path: &str, content: Bytes) -> StoreResult<PutReceipt> {
        let mut state = self.lock()?;
        state.enter(StoreOp::Put, path)?;

        let content_id = ContentId::derive(&content);
        let hidden_for = match self.lag {
            PropagationLag::Immediate => Some(0),
            PropagationLag::Polls(n) => Some(n),
            PropagationLag::Never => None,
        };
        let entry = PathEntry {
            content_id: content_id.clone(),
            size: content.len() as u64,
            last_modified: Utc::now(),
            hidden_for,
        };
        state.blobs.entry(content_id.clone()).or_insert(content);
        state.paths.insert(path.to_string(), entry);
        debug!(path, cid = %content_id.short(), "object written");

        Ok(PutReceipt {
            content_id: (hidden_for == Some(0)).then_some(content_id),
        })
    }

    async fn head_metadata(&self, path: &str) -> StoreResult<Option<ObjectMetadata>> {
        let mut state = self.lock()?;
        state.enter(StoreOp::HeadMetadata, path)?;

        let Some(entry) = state.paths.get_mut(path) else {
            return Ok(None);
        };
        let metadata = entry.metadata();
        if let Some(n) = entry.hidden_for.as_mut() {
            *n = n.saturating_sub(1);
        }
        Ok(Some(metadata))
    }

    async fn fetch_by_content_id(&self, id: &ContentId) -> StoreResult<Bytes> {
        let mut state = self.lock()?;
        state.enter(StoreOp::FetchByContentId, id.as_str())?;
        state
            .blobs
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::ContentNotFound(id.clone()))
    }

    async fn list(&self, prefix: &str) -> StoreResult<Vec<ObjectEntry>> {
        let mut state = self.lock()?;
        state.enter(StoreOp::List, prefix)?;
        Ok(state
            .paths
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, entry)| ObjectEntry {
                key: key.clone(),
                last_modified: entry.last_modified,
                size: entry.size,
            })
            .collect())
    }

    async fn delete(&self, path: &str) -> StoreResult<DeleteReceipt> {
        let mut state = self.lock()?;
        state.enter(StoreOp::Delete, path)?;
        // Pinned bytes stay behind: the identifier remains fetchable.
        let success = state.paths.remove(path).is_some();
        debug!(path, success, "object deleted");
        Ok(DeleteReceipt { success })
    }
}

impl std::fmt::Debug for InMemoryObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryObjectStore")
            .field("path_count", &self.len())
            .field("lag", &self.lag)
            .finish()
    }
}
