//! Data model (`spec.md` §3). The engine does not keep these as in-memory
//! structs across calls — "Item", "Client", and "Collection" are views over
//! substrate keys (§3 "Ownership") — but the shapes here give the facade
//! and atomic-script results a typed surface instead of loosely-typed
//! tuples, per the design note in `spec.md` §9 ("model script results as
//! explicit tagged pairs").

use std::time::Duration;

/// Result of `Authorize-Get` (`spec.md` §4.C.2): authorize-then-fetch as a
/// single atomic step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizeOutcome {
    pub authorized: bool,
    pub value: Option<Vec<u8>>,
}

impl AuthorizeOutcome {
    pub fn miss() -> Self {
        Self { authorized: false, value: None }
    }

    pub fn hit(value: Vec<u8>) -> Self {
        Self { authorized: true, value: Some(value) }
    }

    pub fn is_hit(&self) -> bool {
        self.authorized && self.value.is_some()
    }
}

/// Result of `Dominance-Get` (`spec.md` §4.C.4): a dominating variant's
/// per-item values, already re-filtered to what *this* client may see.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DominanceOutcome {
    pub hit: bool,
    pub values: Vec<Vec<u8>>,
}

impl DominanceOutcome {
    pub fn miss() -> Self {
        Self { hit: false, values: Vec::new() }
    }
}

/// Result of `Filter-Permissions` (`spec.md` §4.C.3): the number of client
/// permissions that matched the pattern and were copied into the
/// destination set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterOutcome {
    pub count: u64,
}

/// A single variant row as read back during `Dominance-Get`, before the
/// per-item re-filter in step 5c. Exposed for substrate implementations
/// and tests; not part of the on-substrate layout itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantSnapshot {
    pub variant_id: String,
    pub count: u64,
    pub items: Vec<String>,
    pub perms: Vec<String>,
}

/// Time-to-live for a substrate key. `None` means "do not expire" — used
/// for backprop edges and collection context filters, which `spec.md` §3
/// and §9 deliberately keep outside the TTL model (topology, not data).
pub type Ttl = Option<Duration>;

/// Input to `setCollection` (`spec.md` §4.D): the writer's snapshot of a
/// collection at write time.
#[derive(Debug, Clone)]
pub struct NewVariant<'a> {
    pub client_id: &'a str,
    pub collection_key: &'a str,
    pub items: &'a [String],
    pub ttl: Ttl,
    /// The collection's context filter pattern (`spec.md` §3 "Collection").
    /// Declaring a different pattern for an already-declared collection is
    /// a caller-fault (`spec.md` §6), surfaced as `CacheError::Config`.
    pub filter: &'a str,
}
