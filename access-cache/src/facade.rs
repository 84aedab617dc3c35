//! The stateless cache facade (`spec.md` §4.D) and its two backpropagation
//! admin helpers (§4.E).
//!
//! `CacheFacade` holds no mutable state of its own between calls — only the
//! substrate handle and the grammar collaborator — the same shape as
//! `r2e_openfga::registry::OpenFgaRegistry` wrapping a `Box<dyn
//! OpenFgaBackend>` and doing all its bookkeeping through that seam.

use access_cache_core::model::{DominanceOutcome, Ttl};
use access_cache_core::{keys, CacheError, Grammar, Substrate};
use uuid::Uuid;

/// Orchestrates the Key Namer, the Permission Grammar Provider, and the four
/// atomic scripts behind a small, stateless API.
///
/// Generic over the substrate and grammar so callers can wire up
/// `access-cache-redis`'s `RedisSubstrate` in production and
/// `access-cache-mock`'s `MockSubstrate` in tests, without this crate
/// depending on either.
pub struct CacheFacade<S, G> {
    substrate: S,
    grammar: G,
}

impl<S: Substrate, G: Grammar> CacheFacade<S, G> {
    pub fn new(substrate: S, grammar: G) -> Self {
        Self { substrate, grammar }
    }

    /// Borrow the grammar collaborator, e.g. to build a collection's context
    /// filter with [`Grammar::context_filter_for`] before calling
    /// [`set_collection`](Self::set_collection).
    pub fn grammar(&self) -> &G {
        &self.grammar
    }

    /// `set(k,v,ttl,cid,P...)`: store a protected item. Writes `value`, runs
    /// Propagate to grow `perms` (on this item and along backprop edges),
    /// then re-arms `perms`'s TTL — Propagate only `SADD`s, it never touches
    /// a key's expiry.
    pub async fn set(
        &self,
        item_key: &str,
        value: Vec<u8>,
        ttl: Ttl,
        client_id: &str,
        perms: &[String],
    ) -> Result<(), CacheError> {
        tracing::debug!(item_key, client_id, perm_count = perms.len(), "set");
        self.substrate.set(&keys::item_value(item_key), value, ttl).await?;
        self.substrate.propagate(item_key, client_id, perms).await?;
        if let Some(ttl) = ttl {
            self.substrate.expire(&keys::item_perms(item_key), ttl).await?;
        }
        Ok(())
    }

    /// `get(cid,k)`: Authorize-Get, with partial expiry (authorized but no
    /// value) treated as a miss.
    pub async fn get(&self, client_id: &str, item_key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let outcome = self.substrate.authorize_get(client_id, item_key).await?;
        if !outcome.is_hit() {
            tracing::debug!(item_key, client_id, authorized = outcome.authorized, "get: miss");
        }
        Ok(if outcome.is_hit() { outcome.value } else { None })
    }

    /// `setPrivate`: write a per-(item, client) value, bypassing the
    /// permission gate entirely.
    pub async fn set_private(
        &self,
        item_key: &str,
        client_id: &str,
        value: Vec<u8>,
        ttl: Ttl,
    ) -> Result<(), CacheError> {
        self.substrate.set(&keys::item_private(item_key, client_id), value, ttl).await
    }

    /// `getPrivate`: read a per-(item, client) value.
    pub async fn get_private(&self, item_key: &str, client_id: &str) -> Result<Option<Vec<u8>>, CacheError> {
        self.substrate.get(&keys::item_private(item_key, client_id)).await
    }

    /// `setUnprotected`: write a value only if the item has no `perms` key
    /// (I5). Returns `false` without error when the item is protected — a
    /// documented no-op, not a failure.
    pub async fn set_unprotected(&self, item_key: &str, value: Vec<u8>, ttl: Ttl) -> Result<bool, CacheError> {
        let written = self.substrate.set_if_unprotected(item_key, value, ttl).await?;
        if !written {
            tracing::debug!(item_key, "setUnprotected: item is protected, skipped");
        }
        Ok(written)
    }

    /// `getUnprotected`: read a value only if the item has no `perms` key.
    pub async fn get_unprotected(&self, item_key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        self.substrate.get_if_unprotected(item_key).await
    }

    /// `setCollection(cid,ck,items,ttl,F)`: allocate a fresh variant
    /// (never idempotent — every call is a new snapshot), store its item
    /// membership, run Filter-Permissions to capture the writer's
    /// context-filtered permissions, cache the count, and register the
    /// variant. Also folds `items` into the collection's legacy flat
    /// membership set, the one [`set_backpropagation`](Self::set_backpropagation)
    /// reads (`spec.md` §4.E).
    ///
    /// Returns the newly allocated variant id.
    pub async fn set_collection(
        &self,
        client_id: &str,
        collection_key: &str,
        items: &[String],
        ttl: Ttl,
        filter: &str,
    ) -> Result<String, CacheError> {
        self.substrate.declare_collection_filter(collection_key, filter).await?;

        let variant_id = Uuid::now_v7().to_string();
        tracing::debug!(collection_key, client_id, variant_id, item_count = items.len(), "setCollection");

        let items_key = keys::variant_items(collection_key, &variant_id);
        self.substrate.sadd(&items_key, items).await?;
        if let Some(ttl) = ttl {
            self.substrate.expire(&items_key, ttl).await?;
        }

        let perms_key = keys::variant_perms(collection_key, &variant_id);
        let outcome = self.substrate.filter_permissions(client_id, &perms_key, filter).await?;
        if let Some(ttl) = ttl {
            self.substrate.expire(&perms_key, ttl).await?;
        }

        let count_key = keys::variant_count(collection_key, &variant_id);
        self.substrate.set(&count_key, outcome.count.to_string().into_bytes(), ttl).await?;

        self.substrate.sadd(&keys::collection_variants(collection_key), &[variant_id.clone()]).await?;
        self.substrate.sadd(&keys::collection_items(collection_key), items).await?;

        Ok(variant_id)
    }

    /// `getCollection(cid,ck)`: Dominance-Get. Values come back as raw
    /// bytes — this engine stores opaque payloads, deserialization is the
    /// caller's concern (`spec.md` §1).
    pub async fn get_collection(&self, client_id: &str, collection_key: &str) -> Result<DominanceOutcome, CacheError> {
        let outcome = self.substrate.dominance_get(client_id, collection_key).await?;
        if !outcome.hit {
            tracing::debug!(collection_key, client_id, "getCollection: no dominating variant");
        }
        Ok(outcome)
    }

    /// `setBackpropagation(ck,T,tgt)`: for every member of `ck`'s legacy
    /// flat item set, install a `T`-typed backprop edge pointing at `tgt`.
    /// Must run before the items are (re)written with the permissions you
    /// expect to flow to `tgt` — Propagate reads an item's *current* edges.
    pub async fn set_backpropagation(
        &self,
        collection_key: &str,
        type_token: &str,
        target_item_key: &str,
    ) -> Result<(), CacheError> {
        let members = self.substrate.smembers(&keys::collection_items(collection_key)).await?;
        tracing::debug!(collection_key, type_token, target_item_key, member_count = members.len(), "setBackpropagation");
        let target = [target_item_key.to_string()];
        for member in &members {
            self.substrate.sadd(&keys::item_backprop(member, type_token), &target).await?;
        }
        Ok(())
    }

    /// `setPermissionUnion(keys...)`: wires every key to every other key
    /// under the any-type edge, so permissions on one alias flow to every
    /// other alias of the same real-world entity.
    pub async fn set_permission_union(&self, item_keys: &[String]) -> Result<(), CacheError> {
        let any_type = self.grammar.every_type_pattern();
        for a in item_keys {
            for b in item_keys {
                if a == b {
                    continue;
                }
                self.substrate.sadd(&keys::item_backprop(a, &any_type), &[b.clone()]).await?;
            }
        }
        Ok(())
    }
}
