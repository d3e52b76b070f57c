//! Errors raised while building the intent catalog.
//!
//! Routing itself never fails: a non-matching message falls through to the
//! conversational fallback and every runtime failure becomes a reply.

/// Unified error type for intent catalog construction.
#[derive(Debug, thiserror::Error)]
pub enum IntentError {
    /// A pattern is not a valid regular expression.
    #[error("invalid pattern for intent `{intent}`: {source}")]
    InvalidPattern {
        intent: String,
        #[source]
        source: regex::Error,
    },

    /// A pattern has fewer capture groups than its extraction needs.
    #[error("pattern `{pattern}` of intent `{intent}` has {found} capture group(s), needs {needed}")]
    MissingCaptures {
        intent: String,
        pattern: String,
        needed: usize,
        found: usize,
    },

    /// A binding names an intent that is not in the catalog.
    #[error("unknown intent `{0}` in bindings")]
    UnknownIntent(String),

    /// A binding names a handler that does not exist.
    #[error("unknown handler `{0}`")]
    UnknownHandler(String),

    /// A binding pairs an intent with a handler taking a different number of arguments.
    #[error("handler `{handler}` takes {handler_arity} argument(s) but intent `{intent}` extracts {extracted}")]
    ArityMismatch {
        intent: String,
        handler: String,
        handler_arity: usize,
        extracted: usize,
    },
}

/// Convenience alias used throughout the intent module.
pub type Result<T> = std::result::Result<T, IntentError>;
