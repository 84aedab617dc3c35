//! The access-aware cache engine's facade crate: wires the Key Namer, the
//! Permission Grammar Provider, and a pluggable [`Substrate`] into the
//! operations `spec.md` §4.D and §4.E describe.
//!
//! Pick a substrate (`access-cache-redis::RedisSubstrate` in production,
//! `access-cache-mock::MockSubstrate` in tests) and a grammar
//! (`access-cache-grammar::TokenGrammar`, or a custom one), and construct a
//! [`CacheFacade`].

mod facade;

pub use facade::CacheFacade;
pub use access_cache_core::{AuthorizeOutcome, CacheError, DominanceOutcome, FilterOutcome, Grammar, Substrate};
