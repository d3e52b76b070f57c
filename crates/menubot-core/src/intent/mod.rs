//! Intent routing engine.
//!
//! - **Catalog**: ordered, compiled intents via [`patterns::IntentCatalog`].
//! - **Matcher**: first-match scanning and name normalization in [`matcher`].
//! - **Router**: exit check, dispatch and fallthrough via [`router::Router`].
//! - **Fallback**: conversational model bridge in [`fallback`].

pub mod error;
pub mod fallback;
pub mod matcher;
pub mod patterns;
pub mod reply;
pub mod router;

pub use error::{IntentError, Result};
pub use fallback::{ConversationFallback, APOLOGY_MESSAGE};
pub use matcher::MatchResult;
pub use patterns::{Classification, Extraction, HandlerId, IntentCatalog, IntentDescriptor};
pub use reply::{ReplySink, TransportReply};
pub use router::{IntentArgs, IntentHandlers, Router, RouterOutcome};
