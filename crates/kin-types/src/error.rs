use thiserror::Error;

/// Errors produced when constructing foundation types.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("identity must not be empty")]
    EmptyDid,

    #[error("invalid identity {did:?}: {reason}")]
    InvalidDid { did: String, reason: String },

    #[error("content identifier must not be empty")]
    EmptyContentId,
}
