//! Reference [`Grammar`] implementation following the worked example in
//! `spec.md` §4.B: permission tokens are `;`-delimited, and a token's
//! *type* is the subsequence of its even-indexed segments — e.g.
//! `domain;X;course;7;user;42` → `domain;course;user`.
//!
//! This is a reference, not the only legal grammar: `spec.md` treats the
//! grammar as an injected, external collaborator, and any pure/total
//! implementation of [`Grammar`] is a valid substitute.

use access_cache_core::Grammar;
use regex::Regex;

/// `;`-delimited token grammar: odd-indexed segments are the scope values
/// (a domain id, a course id, a user id...), even-indexed segments are the
/// scope names that make up the token's type.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokenGrammar;

impl TokenGrammar {
    pub fn new() -> Self {
        Self
    }

    fn segments(token: &str) -> impl Iterator<Item = &str> {
        token.split(';')
    }
}

impl Grammar for TokenGrammar {
    fn type_of(&self, token: &str) -> String {
        Self::segments(token)
            .enumerate()
            .filter(|(i, _)| i % 2 == 0)
            .map(|(_, s)| s)
            .collect::<Vec<_>>()
            .join(";")
    }

    fn context_filter_for(&self, kind: &str, arguments: &[&str]) -> String {
        // Anchor on the collaborator-supplied `kind` (the scope name,
        // e.g. "perm:x") followed by a wildcard tail, optionally narrowed
        // by `arguments` (e.g. a specific course id). This mirrors how the
        // end-to-end scenarios in `spec.md` §8 build filters such as
        // `perm:x:.*` or `perm:read:%d+` translated to this crate's
        // (POSIX/PCRE-flavored) pattern dialect.
        if arguments.is_empty() {
            format!("^{}.*$", regex::escape(kind))
        } else {
            format!("^{};{}$", regex::escape(kind), arguments.join(";"))
        }
    }

    fn filter_to_context(&self, filter: &str, tokens: &[String]) -> Vec<String> {
        match Regex::new(filter) {
            Ok(re) => tokens.iter().filter(|t| re.is_match(t)).cloned().collect(),
            Err(_) => Vec::new(),
        }
    }

    fn matches(&self, pattern: &str, token: &str) -> bool {
        if pattern == self.every_type_pattern() {
            return true;
        }
        Regex::new(pattern).map(|re| re.is_match(token)).unwrap_or(false)
    }

    fn every_type_pattern(&self) -> String {
        ".*".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_type_from_even_indexed_segments() {
        let g = TokenGrammar::new();
        assert_eq!(g.type_of("domain;X;course;7;user;42"), "domain;course;user");
    }

    #[test]
    fn every_type_pattern_matches_anything() {
        let g = TokenGrammar::new();
        assert!(g.matches(&g.every_type_pattern(), "perm:anything:at:all"));
    }

    #[test]
    fn typed_pattern_matches_only_its_type() {
        let g = TokenGrammar::new();
        assert!(g.matches(r"^perm:type:\d+$", "perm:type:42"));
        assert!(!g.matches(r"^perm:type:\d+$", "perm:othertype:42"));
    }

    #[test]
    fn filter_to_context_keeps_only_matching_tokens() {
        let g = TokenGrammar::new();
        let tokens = vec!["perm:x:1".to_string(), "perm:y:1".to_string(), "perm:x:2".to_string()];
        let filtered = g.filter_to_context(r"^perm:x:\d+$", &tokens);
        assert_eq!(filtered, vec!["perm:x:1".to_string(), "perm:x:2".to_string()]);
    }
}
