//! The substrate contract (`spec.md` §6): "an abstract key-value + set +
//! atomic-script service". [`Substrate`] is the seam the facade is generic
//! over — implement it to plug in a concrete backend (Redis, or an
//! in-memory mock for tests), the same way `r2e_openfga::OpenFgaBackend`
//! lets the registry swap a gRPC client for a `MockBackend`.
//!
//! Only the four named atomic scripts (`spec.md` §4.C) and a handful of
//! primitive key-value operations are exposed; everything above this trait
//! (key naming, permission grammar, collection bookkeeping) lives in the
//! facade, not here.

use crate::error::Result;
use crate::model::{AuthorizeOutcome, DominanceOutcome, FilterOutcome, Ttl};
use std::future::Future;
use std::pin::Pin;

/// A future boxed the way `r2e-openfga`'s backend trait boxes its checks,
/// so implementors don't need `async_trait` and the trait stays object-safe.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The storage substrate: string GET/SET with TTL, set operations, and the
/// four atomic scripts from `spec.md` §4.C. A substrate riding on Redis
/// (or any comparable server with atomic scripting) can implement this
/// directly against its native commands; an in-memory substrate can
/// implement the same operations natively in Rust, as long as the
/// semantics in `spec.md` §4.C.1–§4.C.4 hold exactly.
pub trait Substrate: Send + Sync + 'static {
    /// `GET key`. Returns `None` on a miss or on expiry (`spec.md` §3,
    /// "partial expiry").
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<Vec<u8>>>>;

    /// `SET key value [EX ttl]`. `ttl = None` writes a non-expiring key —
    /// used for backprop edges and collection filters (`spec.md` §3, §9).
    fn set<'a>(&'a self, key: &'a str, value: Vec<u8>, ttl: Ttl) -> BoxFuture<'a, Result<()>>;

    /// Re-arm a key's TTL without rewriting its value (`spec.md` §4.D,
    /// `set`'s "re-arm TTL on perms").
    fn expire<'a>(&'a self, key: &'a str, ttl: std::time::Duration) -> BoxFuture<'a, Result<()>>;

    /// Existence check, independent of TTL bookkeeping elsewhere.
    fn exists<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<bool>>;

    /// `SADD key member...`. A no-op on an empty `members` slice.
    fn sadd<'a>(&'a self, key: &'a str, members: &'a [String]) -> BoxFuture<'a, Result<()>>;

    /// `SMEMBERS key`, in substrate order (`spec.md` §4.C.4 step 5c).
    fn smembers<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Vec<String>>>;

    /// `SCAN`/`KEYS`-style enumeration of the backprop-edge keys attached
    /// to an item (`spec.md` §4.C.1 step 2b: "Enumerate every backprop-edge
    /// key of the form `<item-prefix><I>:backprop:<T>`").
    fn backprop_edge_keys<'a>(&'a self, item_key: &'a str) -> BoxFuture<'a, Result<Vec<String>>>;

    /// Atomically write `value` under `item_key`'s value slot only if the
    /// item has no `perms` key (`spec.md` §4.D `setUnprotected`, invariant
    /// I5). Returns whether the write happened.
    fn set_if_unprotected<'a>(
        &'a self,
        item_key: &'a str,
        value: Vec<u8>,
        ttl: Ttl,
    ) -> BoxFuture<'a, Result<bool>>;

    /// Atomically read `item_key`'s value only if it has no `perms` key.
    fn get_if_unprotected<'a>(&'a self, item_key: &'a str) -> BoxFuture<'a, Result<Option<Vec<u8>>>>;

    /// Declare a collection's context filter, atomically rejecting a
    /// conflicting redeclaration (`spec.md` §6, last paragraph) with
    /// `CacheError::Config`. A repeat declaration of the *same* value is a
    /// no-op, not an error.
    fn declare_collection_filter<'a>(
        &'a self,
        collection_key: &'a str,
        filter: &'a str,
    ) -> BoxFuture<'a, Result<()>>;

    /// `Propagate` (`spec.md` §4.C.1): add `perms` to `client_id`'s
    /// permission set and to `root_item_key`, then flood them along
    /// backprop edges with a visited-set BFS. A zero-length `perms`
    /// short-circuits before any substrate call.
    fn propagate<'a>(
        &'a self,
        root_item_key: &'a str,
        client_id: &'a str,
        perms: &'a [String],
    ) -> BoxFuture<'a, Result<()>>;

    /// `Authorize-Get` (`spec.md` §4.C.2): authorize-then-fetch as one
    /// atomic step.
    fn authorize_get<'a>(&'a self, client_id: &'a str, item_key: &'a str) -> BoxFuture<'a, Result<AuthorizeOutcome>>;

    /// `Filter-Permissions` (`spec.md` §4.C.3): copy every client
    /// permission matching `pattern` into `dst_key`, returning the count.
    fn filter_permissions<'a>(
        &'a self,
        client_id: &'a str,
        dst_key: &'a str,
        pattern: &'a str,
    ) -> BoxFuture<'a, Result<FilterOutcome>>;

    /// `Dominance-Get` (`spec.md` §4.C.4): the full collection read path.
    fn dominance_get<'a>(&'a self, client_id: &'a str, collection_key: &'a str) -> BoxFuture<'a, Result<DominanceOutcome>>;
}
