use std::sync::Arc;

use bytes::Bytes;
use kin_store::ObjectStoreClient;
use kin_types::ContentId;
use tracing::{debug, warn};

use crate::error::{ResolverError, ResolverResult};
use crate::policy::RetryPolicy;

/// Outcome of looking up a path's content identifier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// The path currently resolves to this identifier.
    Resolved(ContentId),
    /// No object exists at the path.
    NotFound,
    /// An object exists but its identifier has not been published yet.
    Pending,
}

impl Resolution {
    /// The resolved identifier, if any.
    pub fn content_id(&self) -> Option<&ContentId> {
        match self {
            Self::Resolved(id) => Some(id),
            Self::NotFound | Self::Pending => None,
        }
    }

    /// Returns `true` if an object exists at the path, published or not.
    pub fn exists(&self) -> bool {
        !matches!(self, Self::NotFound)
    }
}

/// Resolves logical paths to their current content identifiers.
///
/// The resolver never caches: a path's identifier changes with every write,
/// so each call asks the backend again.
pub struct CidResolver<C: ?Sized> {
    client: Arc<C>,
}

impl<C: ?Sized> Clone for CidResolver<C> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
        }
    }
}

impl<C: ObjectStoreClient + ?Sized> CidResolver<C> {
    pub fn new(client: Arc<C>) -> Self {
        Self { client }
    }

    /// The backend client this resolver queries.
    pub fn client(&self) -> &Arc<C> {
        &self.client
    }

    /// Look up the path's content identifier once.
    pub async fn resolve(&self, path: &str) -> ResolverResult<Resolution> {
        let resolution = match self.client.head_metadata(path).await? {
            None => Resolution::NotFound,
            Some(meta) => match meta.content_id {
                Some(id) => Resolution::Resolved(id),
                None => Resolution::Pending,
            },
        };
        debug!(path, ?resolution, "resolved path");
        Ok(resolution)
    }

    /// Resolve a path the caller has just written, waiting out propagation.
    ///
    /// Both `NotFound` and `Pending` are retried, sleeping according to
    /// `policy` between attempts. When the attempts run out, a path that
    /// still does not exist is reported as [`Resolution::NotFound`] and a
    /// path whose identifier never appeared as
    /// [`ResolverError::MetadataUnavailable`]. Never returns
    /// [`Resolution::Pending`].
    pub async fn resolve_with_retry(
        &self,
        path: &str,
        policy: &RetryPolicy,
    ) -> ResolverResult<Resolution> {
        policy.validate()?;

        let mut last = Resolution::NotFound;
        for attempt in 1..=policy.max_attempts {
            last = self.resolve(path).await?;
            if let Resolution::Resolved(_) = last {
                return Ok(last);
            }
            if attempt < policy.max_attempts {
                let delay = policy.delay_after(attempt);
                debug!(path, attempt, delay_ms = delay.as_millis() as u64, "content id not ready; backing off");
                tokio::time::sleep(delay).await;
            }
        }

        match last {
            Resolution::Pending => {
                warn!(path, attempts = policy.max_attempts, "content id never published");
                Err(ResolverError::MetadataUnavailable {
                    path: path.to_string(),
                    attempts: policy.max_attempts,
                })
            }
            other => Ok(other),
        }
    }

    /// Fetch the bytes pinned under a resolved identifier.
    pub async fn fetch(&self, id: &ContentId) -> ResolverResult<Bytes> {
        let data = self.client.fetch_by_content_id(id).await?;
        debug!(cid = %id.short(), size = data.len(), "fetched content");
        Ok(data)
    }
}
