//! End-to-end scenarios from `spec.md` §8, driven through [`CacheFacade`]
//! against `access-cache-mock`'s in-memory substrate.

use access_cache::CacheFacade;
use access_cache_grammar::TokenGrammar;
use access_cache_mock::MockSubstrate;

fn facade() -> CacheFacade<MockSubstrate, TokenGrammar> {
    CacheFacade::new(MockSubstrate::new(), TokenGrammar::new())
}

fn perms(tokens: &[&str]) -> Vec<String> {
    tokens.iter().map(|t| t.to_string()).collect()
}

#[tokio::test]
async fn s1_permission_gate() {
    let cache = facade();
    cache
        .set("item-1", b"payload".to_vec(), None, "client-a", &perms(&["perm:read"]))
        .await
        .unwrap();

    assert_eq!(cache.get("client-a", "item-1").await.unwrap(), Some(b"payload".to_vec()));
    assert_eq!(cache.get("client-b", "item-1").await.unwrap(), None);
}

#[tokio::test]
async fn s2_permission_union() {
    let cache = facade();
    cache
        .set_permission_union(&["item-root".to_string(), "item-shadow".to_string()])
        .await
        .unwrap();

    cache
        .set("item-root", b"Root".to_vec(), None, "client-x", &perms(&["perm:union"]))
        .await
        .unwrap();

    assert_eq!(cache.get("client-x", "item-shadow").await.unwrap(), Some(b"Root".to_vec()));
}

#[tokio::test]
async fn s3_typed_backprop_match_and_non_match() {
    let cache = facade();
    cache
        .set_collection("client-setup", "bp-collection", &["bp-child".to_string()], None, ".*")
        .await
        .unwrap();
    cache.set_backpropagation("bp-collection", r"^perm:type:\d+$", "bp-parent").await.unwrap();

    cache
        .set("bp-child", b"payload".to_vec(), None, "client-bp", &perms(&["perm:type:42"]))
        .await
        .unwrap();
    cache
        .set("bp-parent", b"parent-payload".to_vec(), None, "client-other", &perms(&["perm:unrelated"]))
        .await
        .unwrap();
    // The propagated perm:type:42 now sits on bp-parent's perms, so a client
    // who only ever observed it through propagation can still read the item.
    assert_eq!(
        cache.get("client-bp", "bp-parent").await.unwrap(),
        Some(b"parent-payload".to_vec())
    );

    let cache2 = facade();
    cache2
        .set_collection("client-setup", "bp-collection2", &["bp-child2".to_string()], None, ".*")
        .await
        .unwrap();
    cache2.set_backpropagation("bp-collection2", r"^perm:type:\d+$", "bp-parent2").await.unwrap();
    cache2
        .set("bp-child2", b"payload".to_vec(), None, "client-bp2", &perms(&["perm:othertype:42"]))
        .await
        .unwrap();
    cache2
        .set("bp-parent2", b"parent-payload".to_vec(), None, "client-other2", &perms(&["perm:unrelated"]))
        .await
        .unwrap();
    // perm:othertype:42 never matched the edge's type pattern, so it never
    // reached bp-parent2's perms, and client-bp2 has no other overlap.
    assert_eq!(cache2.get("client-bp2", "bp-parent2").await.unwrap(), None);
}

#[tokio::test]
async fn s4_collection_dominance_hit() {
    let cache = facade();
    for (item, value, perm) in [("item-a", "A", "perm:x:1"), ("item-b", "B", "perm:x:2"), ("item-c", "C", "perm:x:3")] {
        cache
            .set(item, value.as_bytes().to_vec(), None, "client-alpha", &perms(&[perm]))
            .await
            .unwrap();
    }

    cache
        .set_collection(
            "client-alpha",
            "collection-1",
            &["item-a".to_string(), "item-b".to_string(), "item-c".to_string()],
            None,
            "perm:x:.*",
        )
        .await
        .unwrap();

    // Reader only ever observed perm:x:1 and perm:x:2.
    cache
        .set("item-a", b"A".to_vec(), None, "client-beta", &perms(&["perm:x:1"]))
        .await
        .unwrap();
    cache
        .set("item-b", b"B".to_vec(), None, "client-beta", &perms(&["perm:x:2"]))
        .await
        .unwrap();

    let outcome = cache.get_collection("client-beta", "collection-1").await.unwrap();
    assert!(outcome.hit);
    assert_eq!(outcome.values.len(), 2);
    assert!(outcome.values.contains(&b"A".to_vec()));
    assert!(outcome.values.contains(&b"B".to_vec()));
    assert!(!outcome.values.contains(&b"C".to_vec()));
}

#[tokio::test]
async fn s5_collection_dominance_miss_extra_permission() {
    let cache = facade();
    cache
        .set("item-a", b"A".to_vec(), None, "client-writer", &perms(&["perm:read:1"]))
        .await
        .unwrap();
    cache
        .set("item-b", b"B".to_vec(), None, "client-writer", &perms(&["perm:read:2"]))
        .await
        .unwrap();
    cache
        .set_collection(
            "client-writer",
            "collection-2",
            &["item-a".to_string(), "item-b".to_string()],
            None,
            r"^perm:read:\d+$",
        )
        .await
        .unwrap();

    cache
        .set("item-a", b"A".to_vec(), None, "client-reader", &perms(&["perm:read:1", "perm:read:3"]))
        .await
        .unwrap();

    let outcome = cache.get_collection("client-reader", "collection-2").await.unwrap();
    assert!(!outcome.hit);
}

#[tokio::test]
async fn s6_collection_dominance_exact_match_hit() {
    let cache = facade();
    cache
        .set("item-a", b"A".to_vec(), None, "client-writer", &perms(&["perm:view:1"]))
        .await
        .unwrap();
    cache
        .set("item-b", b"B".to_vec(), None, "client-writer", &perms(&["perm:view:2"]))
        .await
        .unwrap();
    cache
        .set_collection(
            "client-writer",
            "collection-3",
            &["item-a".to_string(), "item-b".to_string()],
            None,
            r"^perm:view:\d+$",
        )
        .await
        .unwrap();

    cache
        .set("item-a", b"A".to_vec(), None, "client-reader2", &perms(&["perm:view:1"]))
        .await
        .unwrap();
    cache
        .set("item-b", b"B".to_vec(), None, "client-reader2", &perms(&["perm:view:2"]))
        .await
        .unwrap();

    let outcome = cache.get_collection("client-reader2", "collection-3").await.unwrap();
    assert!(outcome.hit);
    assert_eq!(outcome.values.len(), 2);
}

#[tokio::test]
async fn private_value_bypasses_permission_gate() {
    let cache = facade();
    cache.set_private("item-secret", "client-a", b"only for a".to_vec(), None).await.unwrap();
    assert_eq!(
        cache.get_private("item-secret", "client-a").await.unwrap(),
        Some(b"only for a".to_vec())
    );
    assert_eq!(cache.get_private("item-secret", "client-b").await.unwrap(), None);
}

#[tokio::test]
async fn unprotected_write_refused_once_protected() {
    let cache = facade();
    assert!(cache.set_unprotected("k", b"v1".to_vec(), None).await.unwrap());
    cache.set("k", b"v2".to_vec(), None, "client-a", &perms(&["perm:a"])).await.unwrap();
    assert!(!cache.set_unprotected("k", b"v3".to_vec(), None).await.unwrap());
    assert_eq!(cache.get_unprotected("k").await.unwrap(), None);
}

#[tokio::test]
async fn set_collection_allocates_a_fresh_variant_every_call() {
    let cache = facade();
    cache
        .set("item-a", b"A".to_vec(), None, "client-writer", &perms(&["perm:v:1"]))
        .await
        .unwrap();

    let v1 = cache
        .set_collection("client-writer", "collection-iso", &["item-a".to_string()], None, r"^perm:v:\d+$")
        .await
        .unwrap();
    let v2 = cache
        .set_collection("client-writer", "collection-iso", &["item-a".to_string()], None, r"^perm:v:\d+$")
        .await
        .unwrap();

    // setCollection is never idempotent: every call allocates a new variant
    // id, even with identical arguments (spec.md §4.D).
    assert_ne!(v1, v2);
}

#[tokio::test]
async fn set_collection_rejects_conflicting_filter_redeclaration() {
    let cache = facade();
    cache
        .set_collection("client-a", "collection-x", &["item-1".to_string()], None, "^perm:x.*$")
        .await
        .unwrap();

    let conflict = cache
        .set_collection("client-a", "collection-x", &["item-1".to_string()], None, "^perm:y.*$")
        .await;
    assert!(conflict.is_err());
}
