//! Foundation types for Kinship.
//!
//! Every other Kinship crate depends on `kin-types`.
//!
//! # Key Types
//!
//! - [`Did`]: Opaque participant identity, usable as a storage path segment
//! - [`ContentId`]: Backend-assigned identifier of one immutable byte sequence

pub mod content_id;
pub mod did;
pub mod error;

pub use content_id::ContentId;
pub use did::Did;
pub use error::TypeError;
