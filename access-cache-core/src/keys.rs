//! Key Namer (`spec.md` §4.A): a pure, total mapping from logical names to
//! substrate keys. The layout is part of the external contract (`spec.md`
//! §6) — atomic scripts and tests read these exact strings, so every
//! function here must stay bit-compatible with the table in §6.

/// Substrate key for an item's payload.
pub fn item_value(item_key: &str) -> String {
    format!("item:{item_key}:value")
}

/// Substrate key for an item's permission set.
pub fn item_perms(item_key: &str) -> String {
    format!("item:{item_key}:perms")
}

/// Substrate key for one typed backpropagation edge set on an item.
pub fn item_backprop(item_key: &str, type_token: &str) -> String {
    format!("item:{item_key}:backprop:{type_token}")
}

/// Prefix shared by every backprop-edge key on an item, used to enumerate
/// edges during `Propagate` (`spec.md` §4.C.1 step 2b).
pub fn item_backprop_prefix(item_key: &str) -> String {
    format!("item:{item_key}:backprop:")
}

/// Extract the type token from a backprop-edge key produced by
/// [`item_backprop`]. Returns `None` for a malformed key (missing type
/// segment) — callers must treat that as a fatal script error, not a
/// silent skip (`spec.md` §4.C.1 edge cases).
pub fn parse_backprop_type<'a>(item_key: &str, edge_key: &'a str) -> Option<&'a str> {
    let prefix = item_backprop_prefix(item_key);
    let rest = edge_key.strip_prefix(&prefix)?;
    if rest.is_empty() {
        None
    } else {
        Some(rest)
    }
}

/// Substrate key for a per-client private value on an item, bypassing the
/// permission gate (`spec.md` §3, `private-value-per-client`).
pub fn item_private(item_key: &str, client_id: &str) -> String {
    format!("item:{item_key}:private:{client_id}")
}

/// Substrate key for a client's observed permission set.
pub fn client_perms(client_id: &str) -> String {
    format!("client:{client_id}:perms")
}

/// Legacy flat item-membership set for a collection, read by
/// `setBackpropagation` (`spec.md` §4.E, §9).
pub fn collection_items(collection_key: &str) -> String {
    format!("collection:{collection_key}:items")
}

/// The set of variant identifiers recorded for a collection.
pub fn collection_variants(collection_key: &str) -> String {
    format!("collection:{collection_key}:variants")
}

/// The collection's (non-TTL'd) context filter.
pub fn collection_filter(collection_key: &str) -> String {
    format!("collection:{collection_key}:filter")
}

/// A variant's item-membership set.
pub fn variant_items(collection_key: &str, variant_id: &str) -> String {
    format!("collection:{collection_key}:{variant_id}:items")
}

/// A variant's filtered writer-permissions snapshot.
pub fn variant_perms(collection_key: &str, variant_id: &str) -> String {
    format!("collection:{collection_key}:{variant_id}:perms")
}

/// The cached cardinality of a variant's permission snapshot.
pub fn variant_count(collection_key: &str, variant_id: &str) -> String {
    format!("collection:{collection_key}:{variant_id}:count")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_is_bit_exact() {
        assert_eq!(item_value("item-1"), "item:item-1:value");
        assert_eq!(item_perms("item-1"), "item:item-1:perms");
        assert_eq!(
            item_backprop("item-1", "perm:type:%d+"),
            "item:item-1:backprop:perm:type:%d+"
        );
        assert_eq!(item_private("item-1", "client-a"), "item:item-1:private:client-a");
        assert_eq!(client_perms("client-a"), "client:client-a:perms");
        assert_eq!(collection_items("ck"), "collection:ck:items");
        assert_eq!(collection_variants("ck"), "collection:ck:variants");
        assert_eq!(collection_filter("ck"), "collection:ck:filter");
        assert_eq!(variant_items("ck", "v1"), "collection:ck:v1:items");
        assert_eq!(variant_perms("ck", "v1"), "collection:ck:v1:perms");
        assert_eq!(variant_count("ck", "v1"), "collection:ck:v1:count");
    }

    #[test]
    fn parses_backprop_type_token() {
        let key = item_backprop("item-1", "perm:type:%d+");
        assert_eq!(parse_backprop_type("item-1", &key), Some("perm:type:%d+"));
    }

    #[test]
    fn rejects_malformed_backprop_key() {
        assert_eq!(parse_backprop_type("item-1", "item:item-1:backprop:"), None);
        assert_eq!(parse_backprop_type("item-1", "item:item-1:value"), None);
    }
}
