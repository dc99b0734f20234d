//! Object store client contract for Kinship.
//!
//! The storage backend is an external, path-keyed blob store. It accepts
//! writes at mutable logical paths and pins each write under an immutable
//! content identifier, publishing that identifier as side-channel metadata
//! some time after the write completes.
//!
//! # Modules
//!
//! - [`traits`]: The [`ObjectStoreClient`] trait every backend implements
//! - [`object`]: Wire types exchanged with the backend
//! - [`memory`]: [`InMemoryObjectStore`] for tests and embedding
//! - [`error`]: [`StoreError`] and the [`StoreResult`] alias
//!
//! # Design Rules
//!
//! 1. A content identifier, once published, is fetchable forever, even after
//!    its path is overwritten or deleted.
//! 2. A path that exists may not have a content identifier yet; callers must
//!    not treat that as "not found".
//! 3. All backend errors are propagated, never silently ignored.

pub mod error;
pub mod memory;
pub mod object;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use memory::{FaultKind, InMemoryObjectStore, PropagationLag, RecordedOp};
pub use object::{DeleteReceipt, ObjectEntry, ObjectMetadata, PutReceipt, StoreOp};
pub use traits::ObjectStoreClient;
