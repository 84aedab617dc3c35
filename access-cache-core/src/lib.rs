//! Substrate-agnostic core of the access-aware cache engine.
//!
//! This crate has zero database-driver dependencies: it defines the
//! [`Substrate`](substrate::Substrate) trait the facade is generic over,
//! the [`Grammar`](grammar::Grammar) trait the permission-token rules
//! plug into, the on-substrate [`keys`] layout, the [`model`] types
//! returned by the atomic scripts, and [`CacheError`](error::CacheError).
//!
//! Concrete pieces live in sibling crates:
//! - `access-cache-redis` — a [`Substrate`](substrate::Substrate) backed
//!   by Redis, with the four atomic scripts as embedded Lua.
//! - `access-cache-mock` — an in-memory [`Substrate`](substrate::Substrate)
//!   for tests, mirroring the semantics without a Lua runtime.
//! - `access-cache-grammar` — a reference [`Grammar`](grammar::Grammar).
//! - `access-cache` — the [`CacheFacade`] that orchestrates all of the
//!   above into the operations from `spec.md` §4.D–§4.E.

pub mod error;
pub mod grammar;
pub mod keys;
pub mod model;
pub mod substrate;

pub use error::{CacheError, Result};
pub use grammar::Grammar;
pub use model::{AuthorizeOutcome, DominanceOutcome, FilterOutcome, NewVariant, Ttl, VariantSnapshot};
pub use substrate::{BoxFuture, Substrate};

/// Re-exports of the most commonly used types.
pub mod prelude {
    pub use crate::error::{CacheError, Result};
    pub use crate::grammar::Grammar;
    pub use crate::model::{AuthorizeOutcome, DominanceOutcome, FilterOutcome, NewVariant, Ttl};
    pub use crate::substrate::{BoxFuture, Substrate};
}
