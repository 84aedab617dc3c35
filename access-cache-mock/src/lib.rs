//! An in-memory [`Substrate`] for tests, mirroring the role
//! `r2e_openfga::backend::MockBackend` plays for `OpenFgaBackend`: the same
//! semantics as the production backend (`access-cache-redis`), without a
//! Lua runtime or a network round trip.
//!
//! Keys carry independent TTLs the same way Redis keys do regardless of
//! type (`spec.md` §3), so the lazily-evicting lookup here applies to
//! string and set entries alike.

use access_cache_core::keys;
use access_cache_core::{
    AuthorizeOutcome, BoxFuture, CacheError, DominanceOutcome, FilterOutcome, Result, Substrate, Ttl,
};
use dashmap::DashMap;
use regex::Regex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Clone)]
enum StoredValue {
    Str(Vec<u8>),
    Set(HashSet<String>),
}

struct Entry {
    value: StoredValue,
    expires_at: Option<Instant>,
}

/// In-memory substrate backed by `DashMap`, with a single coarse lock
/// guarding the composite check-then-act operations that a real substrate
/// would run as one atomic script. Single-key reads/writes stay lock-free,
/// relying on `DashMap`'s own per-shard locking, the same way the
/// production Redis backend relies on single-command atomicity for them.
pub struct MockSubstrate {
    entries: DashMap<String, Entry>,
    script_lock: Mutex<()>,
}

impl MockSubstrate {
    pub fn new() -> Self {
        Self { entries: DashMap::new(), script_lock: Mutex::new(()) }
    }

    fn is_live(entry: &Entry) -> bool {
        match entry.expires_at {
            Some(at) => Instant::now() < at,
            None => true,
        }
    }

    fn get_raw(&self, key: &str) -> Option<Vec<u8>> {
        let hit = self.entries.get(key).and_then(|e| {
            if Self::is_live(&e) {
                match &e.value {
                    StoredValue::Str(v) => Some(v.clone()),
                    StoredValue::Set(_) => None,
                }
            } else {
                None
            }
        });
        if hit.is_none() {
            self.entries.remove_if(key, |_, e| !Self::is_live(e));
        }
        hit
    }

    fn set_raw(&self, key: &str, value: Vec<u8>, ttl: Ttl) {
        self.entries.insert(
            key.to_string(),
            Entry { value: StoredValue::Str(value), expires_at: ttl.map(|d| Instant::now() + d) },
        );
    }

    fn expire_raw(&self, key: &str, ttl: Duration) {
        if let Some(mut e) = self.entries.get_mut(key) {
            e.expires_at = Some(Instant::now() + ttl);
        }
    }

    fn exists_raw(&self, key: &str) -> bool {
        let live = self.entries.get(key).map(|e| Self::is_live(&e)).unwrap_or(false);
        if !live {
            self.entries.remove_if(key, |_, e| !Self::is_live(e));
        }
        live
    }

    fn sadd_raw(&self, key: &str, members: &[String]) {
        if members.is_empty() {
            return;
        }
        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Entry { value: StoredValue::Set(HashSet::new()), expires_at: None });
        if let StoredValue::Set(set) = &mut entry.value {
            set.extend(members.iter().cloned());
        }
    }

    fn smembers_raw(&self, key: &str) -> Vec<String> {
        let hit = self.entries.get(key).and_then(|e| {
            if Self::is_live(&e) {
                match &e.value {
                    StoredValue::Set(s) => Some(s.iter().cloned().collect::<Vec<_>>()),
                    StoredValue::Str(_) => None,
                }
            } else {
                None
            }
        });
        if hit.is_none() {
            self.entries.remove_if(key, |_, e| !Self::is_live(e));
        }
        hit.unwrap_or_default()
    }

    fn backprop_edges_raw(&self, item_key: &str) -> Vec<String> {
        let prefix = keys::item_backprop_prefix(item_key);
        self.entries
            .iter()
            .filter(|kv| kv.key().starts_with(&prefix) && Self::is_live(kv.value()))
            .map(|kv| kv.key().clone())
            .collect()
    }
}

impl Default for MockSubstrate {
    fn default() -> Self {
        Self::new()
    }
}

fn pattern_matches(pattern: &str, token: &str) -> bool {
    if pattern == ".*" {
        return true;
    }
    Regex::new(pattern).map(|re| re.is_match(token)).unwrap_or(false)
}

impl Substrate for MockSubstrate {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<Vec<u8>>>> {
        Box::pin(async move { Ok(self.get_raw(key)) })
    }

    fn set<'a>(&'a self, key: &'a str, value: Vec<u8>, ttl: Ttl) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.set_raw(key, value, ttl);
            Ok(())
        })
    }

    fn expire<'a>(&'a self, key: &'a str, ttl: Duration) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.expire_raw(key, ttl);
            Ok(())
        })
    }

    fn exists<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<bool>> {
        Box::pin(async move { Ok(self.exists_raw(key)) })
    }

    fn sadd<'a>(&'a self, key: &'a str, members: &'a [String]) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.sadd_raw(key, members);
            Ok(())
        })
    }

    fn smembers<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Vec<String>>> {
        Box::pin(async move { Ok(self.smembers_raw(key)) })
    }

    fn backprop_edge_keys<'a>(&'a self, item_key: &'a str) -> BoxFuture<'a, Result<Vec<String>>> {
        Box::pin(async move { Ok(self.backprop_edges_raw(item_key)) })
    }

    fn set_if_unprotected<'a>(&'a self, item_key: &'a str, value: Vec<u8>, ttl: Ttl) -> BoxFuture<'a, Result<bool>> {
        Box::pin(async move {
            let _guard = self.script_lock.lock().unwrap();
            if self.exists_raw(&keys::item_perms(item_key)) {
                return Ok(false);
            }
            self.set_raw(&keys::item_value(item_key), value, ttl);
            Ok(true)
        })
    }

    fn get_if_unprotected<'a>(&'a self, item_key: &'a str) -> BoxFuture<'a, Result<Option<Vec<u8>>>> {
        Box::pin(async move {
            let _guard = self.script_lock.lock().unwrap();
            if self.exists_raw(&keys::item_perms(item_key)) {
                return Ok(None);
            }
            Ok(self.get_raw(&keys::item_value(item_key)))
        })
    }

    fn declare_collection_filter<'a>(&'a self, collection_key: &'a str, filter: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let _guard = self.script_lock.lock().unwrap();
            let filter_key = keys::collection_filter(collection_key);
            if let Some(existing) = self.get_raw(&filter_key) {
                if existing != filter.as_bytes() {
                    return Err(CacheError::Config(format!(
                        "collection {collection_key} already has a context filter, cannot redeclare"
                    )));
                }
                return Ok(());
            }
            self.set_raw(&filter_key, filter.as_bytes().to_vec(), None);
            Ok(())
        })
    }

    fn propagate<'a>(&'a self, root_item_key: &'a str, client_id: &'a str, perms: &'a [String]) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            if perms.is_empty() {
                return Ok(());
            }
            let _guard = self.script_lock.lock().unwrap();

            self.sadd_raw(&keys::client_perms(client_id), perms);

            // Each frontier entry carries only the permissions that actually
            // reached it: the root carries the full set `perms`, every other
            // node carries the type-matching subset accumulated from its
            // incoming edges (spec.md §4.C.1 step 2b) — a non-matching
            // permission must never reach a node's own `perms` just because
            // it was dequeued. `done` marks nodes whose outgoing edges have
            // already fired; a later incoming edge (e.g. around a cycle)
            // still unions directly onto that node's `perms` but does not
            // re-traverse from it, which is what keeps the BFS terminating.
            let mut done: HashSet<String> = HashSet::new();
            let mut scheduled: HashSet<String> = HashSet::new();
            let mut accum: HashMap<String, Vec<String>> = HashMap::new();
            let mut frontier: VecDeque<String> = VecDeque::new();

            accum.insert(root_item_key.to_string(), perms.to_vec());
            scheduled.insert(root_item_key.to_string());
            frontier.push_back(root_item_key.to_string());

            while let Some(item) = frontier.pop_front() {
                let subset = accum.remove(&item).unwrap_or_default();
                done.insert(item.clone());
                self.sadd_raw(&keys::item_perms(&item), &subset);

                for edge_key in self.backprop_edges_raw(&item) {
                    let type_token = keys::parse_backprop_type(&item, &edge_key).ok_or_else(|| {
                        tracing::error!(edge_key, "propagate: malformed backprop edge key");
                        CacheError::script("propagate", format!("malformed backprop edge key: {edge_key}"))
                    })?;
                    let matching: Vec<String> =
                        subset.iter().filter(|p| pattern_matches(type_token, p)).cloned().collect();
                    if matching.is_empty() {
                        continue;
                    }

                    for target in self.smembers_raw(&edge_key) {
                        if done.contains(&target) {
                            self.sadd_raw(&keys::item_perms(&target), &matching);
                            continue;
                        }
                        let entry = accum.entry(target.clone()).or_default();
                        for p in &matching {
                            if !entry.contains(p) {
                                entry.push(p.clone());
                            }
                        }
                        if scheduled.insert(target.clone()) {
                            frontier.push_back(target);
                        }
                    }
                }
            }
            Ok(())
        })
    }

    fn authorize_get<'a>(&'a self, client_id: &'a str, item_key: &'a str) -> BoxFuture<'a, Result<AuthorizeOutcome>> {
        Box::pin(async move {
            let client_perms: HashSet<String> = self.smembers_raw(&keys::client_perms(client_id)).into_iter().collect();
            let item_perms = self.smembers_raw(&keys::item_perms(item_key));
            let authorized = item_perms.iter().any(|p| client_perms.contains(p));
            if !authorized {
                return Ok(AuthorizeOutcome::miss());
            }
            match self.get_raw(&keys::item_value(item_key)) {
                Some(v) => Ok(AuthorizeOutcome::hit(v)),
                None => Ok(AuthorizeOutcome { authorized: true, value: None }),
            }
        })
    }

    fn filter_permissions<'a>(
        &'a self,
        client_id: &'a str,
        dst_key: &'a str,
        pattern: &'a str,
    ) -> BoxFuture<'a, Result<FilterOutcome>> {
        Box::pin(async move {
            let client_perms = self.smembers_raw(&keys::client_perms(client_id));
            let matching: Vec<String> = client_perms.into_iter().filter(|t| pattern_matches(pattern, t)).collect();
            let count = matching.len() as u64;
            if count > 0 {
                self.sadd_raw(dst_key, &matching);
            }
            Ok(FilterOutcome { count })
        })
    }

    fn dominance_get<'a>(&'a self, client_id: &'a str, collection_key: &'a str) -> BoxFuture<'a, Result<DominanceOutcome>> {
        Box::pin(async move {
            let filter = self.get_raw(&keys::collection_filter(collection_key));
            let client_perms = self.smembers_raw(&keys::client_perms(client_id));
            let client_filtered: Vec<String> = match &filter {
                Some(f) => {
                    let pattern = String::from_utf8_lossy(f).to_string();
                    client_perms.iter().filter(|t| pattern_matches(&pattern, t)).cloned().collect()
                }
                None => Vec::new(),
            };

            let variant_ids = self.smembers_raw(&keys::collection_variants(collection_key));
            if variant_ids.is_empty() {
                return Ok(DominanceOutcome::miss());
            }

            let mut variants: Vec<(String, u64)> = variant_ids
                .into_iter()
                .filter_map(|vid| {
                    let count_key = keys::variant_count(collection_key, &vid);
                    self.get_raw(&count_key).and_then(|bytes| {
                        String::from_utf8_lossy(&bytes).parse::<u64>().ok().map(|c| (vid, c))
                    })
                })
                .collect();
            variants.sort_by(|a, b| b.1.cmp(&a.1));

            for (variant_id, _count) in variants {
                let variant_perms: HashSet<String> =
                    self.smembers_raw(&keys::variant_perms(collection_key, &variant_id)).into_iter().collect();
                let dominates = client_filtered.iter().all(|p| variant_perms.contains(p));
                if !dominates {
                    continue;
                }

                let item_keys = self.smembers_raw(&keys::variant_items(collection_key, &variant_id));
                let mut values = Vec::with_capacity(item_keys.len());
                let mut stale = false;
                for item_key in &item_keys {
                    let item_perms = self.smembers_raw(&keys::item_perms(item_key));
                    let visible = item_perms.iter().any(|p| client_perms.contains(p));
                    if !visible {
                        continue;
                    }
                    match self.get_raw(&keys::item_value(item_key)) {
                        Some(v) => values.push(v),
                        None => {
                            stale = true;
                            break;
                        }
                    }
                }
                if stale {
                    continue;
                }
                return Ok(DominanceOutcome { hit: true, values });
            }

            Ok(DominanceOutcome::miss())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Vec<String> {
        vec![s.to_string()]
    }

    #[tokio::test]
    async fn permission_gate_s1() {
        let sub = MockSubstrate::new();
        sub.set(&keys::item_value("item-1"), b"one".to_vec(), None).await.unwrap();
        sub.propagate("item-1", "client-a", &v("perm:read")).await.unwrap();

        let hit = sub.authorize_get("client-a", "item-1").await.unwrap();
        assert!(hit.is_hit());
        assert_eq!(hit.value, Some(b"one".to_vec()));

        let miss = sub.authorize_get("client-b", "item-1").await.unwrap();
        assert!(!miss.is_hit());
    }

    #[tokio::test]
    async fn typed_backprop_match_s3() {
        let sub = MockSubstrate::new();
        sub.sadd(&keys::collection_items("bp-collection"), &v("bp-child")).await.unwrap();
        sub.sadd(&keys::item_backprop("bp-child", r"^perm:type:\d+$"), &v("bp-parent")).await.unwrap();

        sub.propagate("bp-child", "client-bp", &v("perm:type:42")).await.unwrap();
        let parent_perms = sub.smembers(&keys::item_perms("bp-parent")).await.unwrap();
        assert!(parent_perms.contains(&"perm:type:42".to_string()));
    }

    #[tokio::test]
    async fn typed_backprop_non_match_s3() {
        let sub = MockSubstrate::new();
        sub.sadd(&keys::item_backprop("bp-child2", r"^perm:type:\d+$"), &v("bp-parent2")).await.unwrap();
        sub.propagate("bp-child2", "client-bp2", &v("perm:othertype:42")).await.unwrap();
        let parent_perms = sub.smembers(&keys::item_perms("bp-parent2")).await.unwrap();
        assert!(!parent_perms.contains(&"perm:othertype:42".to_string()));
    }

    #[tokio::test]
    async fn cycle_terminates_and_unions() {
        let sub = MockSubstrate::new();
        sub.sadd(&keys::item_backprop("i", ".*"), &v("j")).await.unwrap();
        sub.sadd(&keys::item_backprop("j", ".*"), &v("i")).await.unwrap();

        sub.propagate("i", "client-c", &v("perm:cyclic")).await.unwrap();

        let i_perms = sub.smembers(&keys::item_perms("i")).await.unwrap();
        let j_perms = sub.smembers(&keys::item_perms("j")).await.unwrap();
        assert!(i_perms.contains(&"perm:cyclic".to_string()));
        assert!(j_perms.contains(&"perm:cyclic".to_string()));
    }

    #[tokio::test]
    async fn variant_isolation_across_collection_writes() {
        // Mirrors what CacheFacade::set_collection does for two successive
        // writers of the same collection, to check that the second write
        // never mutates the first variant's own items/perms/count rows
        // (spec.md §8, testable property 7).
        let sub = MockSubstrate::new();
        let ck = "collection-iso";

        sub.sadd(&keys::client_perms("writer-1"), &v("perm:v:1")).await.unwrap();
        let v1 = "variant-1";
        sub.sadd(&keys::variant_items(ck, v1), &v("item-a")).await.unwrap();
        sub.filter_permissions("writer-1", &keys::variant_perms(ck, v1), r"^perm:v:\d+$").await.unwrap();
        sub.set(&keys::variant_count(ck, v1), b"1".to_vec(), None).await.unwrap();
        sub.sadd(&keys::collection_variants(ck), &v(v1)).await.unwrap();

        sub.sadd(&keys::client_perms("writer-2"), &["perm:v:1".to_string(), "perm:v:2".to_string()]).await.unwrap();
        let v2 = "variant-2";
        sub.sadd(&keys::variant_items(ck, v2), &["item-a".to_string(), "item-b".to_string()]).await.unwrap();
        sub.filter_permissions("writer-2", &keys::variant_perms(ck, v2), r"^perm:v:\d+$").await.unwrap();
        sub.set(&keys::variant_count(ck, v2), b"2".to_vec(), None).await.unwrap();
        sub.sadd(&keys::collection_variants(ck), &v(v2)).await.unwrap();

        assert_eq!(sub.smembers(&keys::variant_items(ck, v1)).await.unwrap(), vec!["item-a".to_string()]);
        let v1_perms = sub.smembers(&keys::variant_perms(ck, v1)).await.unwrap();
        assert_eq!(v1_perms, vec!["perm:v:1".to_string()]);
        assert_eq!(sub.get(&keys::variant_count(ck, v1)).await.unwrap(), Some(b"1".to_vec()));
    }

    #[tokio::test]
    async fn unprotected_protected_separation() {
        let sub = MockSubstrate::new();
        assert!(sub.set_if_unprotected("k", b"v".to_vec(), None).await.unwrap());
        sub.propagate("k", "client-x", &v("perm:a")).await.unwrap();
        assert!(!sub.set_if_unprotected("k", b"v2".to_vec(), None).await.unwrap());
        assert_eq!(sub.get_if_unprotected("k").await.unwrap(), None);
    }
}
