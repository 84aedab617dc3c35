//! Permission Grammar Provider (`spec.md` §4.B): an external collaborator.
//! Implementations must be pure and total; this crate never parses or
//! validates the patterns a `Grammar` produces (`spec.md` §6, "Pattern
//! language") — it only threads them through to the substrate's own
//! pattern engine.

/// Classifies permission tokens and builds the patterns the atomic scripts
/// use for matching (`spec.md` §4.B).
///
/// A reference implementation following the worked example in the spec
/// (`;`-delimited tokens, type = even-indexed segments) lives in the
/// sibling `access-cache-grammar` crate. Callers may supply their own.
pub trait Grammar: Send + Sync + 'static {
    /// Derive a permission token's type by extracting its even-indexed
    /// `;`-delimited segments. Example:
    /// `domain;X;course;7;user;42` → `domain;course;user`.
    fn type_of(&self, token: &str) -> String;

    /// Produce a pattern selecting the permissions relevant to a
    /// collection, from a collaborator-defined `kind` and `arguments`.
    fn context_filter_for(&self, kind: &str, arguments: &[&str]) -> String;

    /// Host-side filter of a token list by a context filter, for
    /// substrate scripting dialects that cannot express the predicate
    /// themselves.
    fn filter_to_context(&self, filter: &str, tokens: &[String]) -> Vec<String>;

    /// Whether `token` matches `pattern` under the substrate's pattern
    /// language. Used by `Propagate` to decide which permissions flow
    /// along a typed backprop edge, and by `Dominance-Get`'s context
    /// filtering when done host-side.
    fn matches(&self, pattern: &str, token: &str) -> bool;

    /// The universal type token used by `setPermissionUnion`: matches
    /// every permission, regardless of type.
    fn every_type_pattern(&self) -> String;
}
