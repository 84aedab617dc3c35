/// Errors surfaced by the access-aware cache engine (`spec.md` §7).
///
/// Caller-fault conditions that are documented no-ops (unprotected-over-
/// protected writes, I5) are *not* represented here — they are silent by
/// design and return normally from the facade.
#[derive(Debug)]
pub enum CacheError {
    /// The storage substrate is unavailable or a call to it timed out.
    /// Never retried internally; the caller decides retry/fallback.
    Substrate(Box<dyn std::error::Error + Send + Sync>),

    /// An atomic script failed to evaluate: a malformed backprop edge key,
    /// a pattern error from the grammar provider, or any other script-level
    /// fault. Indicates corrupted topology or a grammar bug, not a
    /// transient condition.
    Script { op: &'static str, message: String },

    /// A value was found and authorized but failed to deserialize.
    /// Indicates version skew between writer and reader.
    Deserialize(String),

    /// A caller-fault configuration error: a collection's context filter
    /// was redeclared with a conflicting value (`spec.md` §6, last
    /// paragraph). Not a state corruption.
    Config(String),
}

impl CacheError {
    /// Construct a [`CacheError::Substrate`] from any driver error.
    ///
    /// Used by substrate-backend crates (e.g. `access-cache-redis`) to wrap
    /// driver-specific errors without this crate depending on the driver.
    pub fn substrate(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        CacheError::Substrate(Box::new(err))
    }

    /// Construct a [`CacheError::Script`] for the named operation.
    pub fn script(op: &'static str, message: impl Into<String>) -> Self {
        CacheError::Script { op, message: message.into() }
    }
}

impl std::fmt::Display for CacheError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheError::Substrate(err) => write!(f, "substrate error: {err}"),
            CacheError::Script { op, message } => write!(f, "script error in {op}: {message}"),
            CacheError::Deserialize(msg) => write!(f, "deserialize error: {msg}"),
            CacheError::Config(msg) => write!(f, "configuration error: {msg}"),
        }
    }
}

impl std::error::Error for CacheError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CacheError::Substrate(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, CacheError>;
