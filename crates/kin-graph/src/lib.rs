//! Friend-request state machine for Kinship.
//!
//! Relationships live entirely in a directory convention on top of a
//! content-addressed object store. There is no shared relationship record:
//! each participant owns a namespace, and the state of a pair is read back
//! from which files exist where.
//!
//! ```text
//! friendships/<owner>/pending/<other>.json   {"users":[owner,other],"status":"pending"}
//! friendships/<owner>/friends/<other>.json   {"users":[owner,other],"status":"accepted"}
//! ```
//!
//! A request is a single write into the recipient's `pending` namespace.
//! Acceptance is a three-step saga (two `friends` writes, one `pending`
//! delete) with no cross-step atomicity; a failure after the first step is
//! reported as [`GraphError::PartialAcceptance`] carrying an
//! [`AcceptProgress`] marker that [`RelationshipStore::resume_acceptance`]
//! can finish.
//!
//! # Modules
//!
//! - [`store`]: [`RelationshipStore`], the entry point
//! - [`paths`]: The path convention and filename-as-identity parsing
//! - [`record`]: The JSON relationship record
//! - [`saga`]: Accept saga steps and the progress marker
//! - [`state`]: Derived relationship state and the symmetry audit report
//! - [`config`]: [`GraphConfig`], loadable from TOML
//! - [`error`]: [`GraphError`] and the [`GraphResult`] alias

pub mod config;
pub mod error;
pub mod paths;
pub mod record;
pub mod saga;
pub mod state;
pub mod store;

pub use config::GraphConfig;
pub use error::{GraphError, GraphResult};
pub use paths::{LogicalPath, Namespace, DEFAULT_ROOT};
pub use record::{RelationshipRecord, RelationshipStatus};
pub use saga::{AcceptProgress, AcceptReceipt, AcceptStep, WrittenRecord};
pub use state::{RelationshipState, SymmetryReport};
pub use store::RelationshipStore;

// Re-export the collaborator types callers need to wire a store.
pub use kin_resolver::{CidResolver, Resolution, RetryPolicy};
pub use kin_store::{InMemoryObjectStore, ObjectStoreClient, StoreError};
pub use kin_types::{ContentId, Did};
