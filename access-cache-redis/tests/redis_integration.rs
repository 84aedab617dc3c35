//! Integration tests against a live Redis instance. Gated on `REDIS_URL`
//! the way `caliber-api`'s `db-tests` feature gates its Postgres tests —
//! `#[ignore]`d so a plain `cargo test` never needs a server running.

use access_cache_core::keys;
use access_cache_core::Substrate;
use access_cache_redis::{RedisSubstrate, SubstrateConfig};
use std::time::Duration;

async fn connect() -> RedisSubstrate {
    let url = std::env::var("REDIS_URL").expect("REDIS_URL must be set for this test");
    RedisSubstrate::connect(&SubstrateConfig::new(url)).await.expect("connect to redis")
}

#[tokio::test]
#[ignore]
async fn set_then_get_round_trips() {
    let substrate = connect().await;
    let key = "access-cache-test:roundtrip";
    substrate.set(key, b"hello".to_vec(), Some(Duration::from_secs(5))).await.unwrap();
    let value = substrate.get(key).await.unwrap();
    assert_eq!(value, Some(b"hello".to_vec()));
}

#[tokio::test]
#[ignore]
async fn propagate_then_authorize_get_permits_owner() {
    let substrate = connect().await;
    let item = "access-cache-test:item-1";
    let client = "access-cache-test:client-1";
    let perms = vec!["perm:read:1".to_string()];

    substrate.propagate(item, client, &perms).await.unwrap();
    substrate.set(&keys::item_value(item), b"payload".to_vec(), None).await.unwrap();

    let outcome = substrate.authorize_get(client, item).await.unwrap();
    assert!(outcome.authorized);
    assert_eq!(outcome.value, Some(b"payload".to_vec()));
}

#[tokio::test]
#[ignore]
async fn set_if_unprotected_refuses_protected_items() {
    let substrate = connect().await;
    let item = "access-cache-test:item-2";
    let client = "access-cache-test:client-2";

    substrate.propagate(item, client, &["perm:read:1".to_string()]).await.unwrap();
    let written = substrate.set_if_unprotected(item, b"nope".to_vec(), None).await.unwrap();
    assert!(!written);
}

#[tokio::test]
#[ignore]
async fn declare_collection_filter_rejects_conflicting_redeclaration() {
    let substrate = connect().await;
    let collection = "access-cache-test:collection-1";

    substrate.declare_collection_filter(collection, "^perm:x.*$").await.unwrap();
    substrate.declare_collection_filter(collection, "^perm:x.*$").await.unwrap();

    let conflict = substrate.declare_collection_filter(collection, "^perm:y.*$").await;
    assert!(conflict.is_err());
}
