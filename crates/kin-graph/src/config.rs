use kin_resolver::RetryPolicy;
use serde::{Deserialize, Serialize};

use crate::error::{GraphError, GraphResult};
use crate::paths::DEFAULT_ROOT;

/// Configuration for a [`RelationshipStore`](crate::RelationshipStore).
///
/// ```toml
/// root = "friendships"
///
/// [retry]
/// max_attempts = 5
/// initial_delay_ms = 1000
/// multiplier = 2
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Root directory of every relationship path.
    pub root: String,
    /// Backoff used when waiting for a content id to be published.
    pub retry: RetryPolicy,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            root: DEFAULT_ROOT.to_string(),
            retry: RetryPolicy::default(),
        }
    }
}

impl GraphConfig {
    /// Parse and validate a TOML document. Missing keys take defaults.
    pub fn from_toml_str(s: &str) -> GraphResult<Self> {
        let config: Self = toml::from_str(s).map_err(|e| GraphError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> GraphResult<()> {
        if self.root.is_empty() {
            return Err(GraphError::Config("root must not be empty".into()));
        }
        if self.root.starts_with('/') || self.root.ends_with('/') {
            return Err(GraphError::Config(
                "root must not start or end with '/'".into(),
            ));
        }
        self.retry.validate()?;
        Ok(())
    }
}
