use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Domain tag prepended when deriving identifiers locally.
const CONTENT_DOMAIN: &[u8] = b"kin-content-v1:";

/// Identifier of one immutable version of the bytes stored at a path.
///
/// Content identifiers are assigned by the storage backend and are opaque to
/// Kinship: any non-empty string the backend hands out is accepted. Once
/// observed, a `ContentId` denotes exactly one byte sequence forever, while
/// the path it was resolved from may later point at a different one.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentId(String);

impl ContentId {
    /// Wrap a backend-assigned identifier.
    pub fn new(value: impl Into<String>) -> Result<Self, TypeError> {
        let value = value.into();
        if value.is_empty() {
            return Err(TypeError::EmptyContentId);
        }
        Ok(Self(value))
    }

    /// Derive a content identifier from raw bytes (domain-separated BLAKE3).
    ///
    /// Backends that do not hand out their own identifiers, such as the
    /// in-memory store, use this so identical bytes share one identifier.
    pub fn derive(data: &[u8]) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(CONTENT_DOMAIN);
        hasher.update(data);
        Self(hex::encode(hasher.finalize().as_bytes()))
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form (first 8 characters) for log lines.
    pub fn short(&self) -> &str {
        let end = self
            .0
            .char_indices()
            .nth(8)
            .map(|(i, _)| i)
            .unwrap_or(self.0.len());
        &self.0[..end]
    }
}

impl fmt::Debug for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentId({})", self.short())
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ContentId {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ContentId> for String {
    fn from(id: ContentId) -> Self {
        id.0
    }
}
