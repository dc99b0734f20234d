use kin_types::ContentId;

/// Errors from object store operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// No bytes are pinned under the requested content identifier.
    #[error("content not found: {0}")]
    ContentNotFound(ContentId),

    /// Network-level failure talking to the backend.
    #[error("transport error: {0}")]
    Transport(String),

    /// The backend rejected the caller's credentials.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Any other backend failure, including malformed responses.
    #[error("backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Returns `true` for network and authentication failures.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Unauthorized(_))
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
