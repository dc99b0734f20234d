//! Content identifier resolution for Kinship.
//!
//! The backend pins every write under an immutable content identifier but
//! publishes that identifier asynchronously. [`CidResolver`] turns a
//! logical path into the identifier that currently represents it and, for
//! paths the caller has just written, polls with bounded exponential
//! backoff until the identifier shows up.
//!
//! The backoff loop absorbs consistency lag only. Transport and
//! authentication failures are returned on the attempt that hit them.

pub mod error;
pub mod policy;
pub mod resolver;

pub use error::{ResolverError, ResolverResult};
pub use policy::RetryPolicy;
pub use resolver::{CidResolver, Resolution};
