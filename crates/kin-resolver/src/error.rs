use kin_store::StoreError;
use thiserror::Error;

/// Errors from content identifier resolution.
#[derive(Debug, Error)]
pub enum ResolverError {
    /// The object exists but its content identifier was not published
    /// within the retry budget.
    #[error("content id for {path} not available after {attempts} attempts")]
    MetadataUnavailable { path: String, attempts: u32 },

    /// The retry policy cannot be executed.
    #[error("invalid retry policy: {0}")]
    InvalidPolicy(String),

    /// Backend failure. Never retried by the backoff loop.
    #[error("backend error: {0}")]
    Backend(#[from] StoreError),
}

/// Result alias for resolver operations.
pub type ResolverResult<T> = Result<T, ResolverError>;
