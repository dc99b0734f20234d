use kin_resolver::ResolverError;
use kin_store::StoreError;
use thiserror::Error;

use crate::saga::AcceptProgress;

/// Errors from relationship operations.
#[derive(Debug, Error)]
pub enum GraphError {
    /// Missing, malformed, or self-referential identities.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// No pending request exists at the path.
    #[error("pending request not found: {path}")]
    NotFound { path: String },

    /// The object exists but its content id never showed up.
    #[error("content id for {path} not available after {attempts} attempts")]
    MetadataUnavailable { path: String, attempts: u32 },

    /// Transport, authentication, or other backend failure.
    #[error("backend error: {0}")]
    Backend(#[from] StoreError),

    /// The accept saga failed after at least one step was applied.
    #[error("{progress} partially applied: {source}")]
    PartialAcceptance {
        progress: Box<AcceptProgress>,
        #[source]
        source: StoreError,
    },

    /// The record body disagrees with the path it was read from.
    #[error("record at {path} disagrees with its path: {reason}")]
    RecordMismatch { path: String, reason: String },

    /// The record body is not a relationship record.
    #[error("malformed record at {path}: {reason}")]
    MalformedRecord { path: String, reason: String },

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<ResolverError> for GraphError {
    fn from(err: ResolverError) -> Self {
        match err {
            ResolverError::MetadataUnavailable { path, attempts } => {
                Self::MetadataUnavailable { path, attempts }
            }
            ResolverError::InvalidPolicy(reason) => Self::Config(reason),
            ResolverError::Backend(e) => Self::Backend(e),
        }
    }
}

/// Result alias for relationship operations.
pub type GraphResult<T> = Result<T, GraphError>;
