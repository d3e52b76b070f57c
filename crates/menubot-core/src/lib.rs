//! 🍔 menubot-core: Core library for the menubot food-ordering assistant.
//!
//! The building blocks:
//!
//! - [`config`] — Typed configuration loading from JSON
//! - [`provider`] — LLM provider trait and OpenAI-compatible implementation
//! - [`intent`] — Pattern catalog, matcher, router and conversational fallback
//! - [`catalog`] — Catalog store trait, JSON-backed store and intent handlers
//! - [`session`] — Per-session history and greeting artifacts
//! - [`bus`] — Async message bus for channel-router decoupling
//! - [`gateway`] — Transports, the router bridge and chat channels
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use menubot_core::catalog::{CatalogHandlers, InMemoryCatalog};
//! use menubot_core::config::Config;
//! use menubot_core::intent::{ConversationFallback, IntentCatalog, Router};
//! use menubot_core::provider::openai::OpenAiProvider;
//! use menubot_core::session::SessionStore;
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = Config::load()?;
//!
//! let (name, entry) = config
//!     .providers
//!     .find_active()
//!     .ok_or_else(|| anyhow::anyhow!("no provider configured"))?;
//! let provider = OpenAiProvider::new(
//!     name,
//!     &entry.api_key,
//!     entry.api_base.as_deref(),
//!     &config.assistant.model,
//!     reqwest::Client::new(),
//! );
//!
//! let catalog = InMemoryCatalog::load(&config.catalog_path())?;
//! let handlers = CatalogHandlers::new(Arc::new(catalog), &config.catalog);
//! let intents = IntentCatalog::with_bindings(&config.intents.bindings)?;
//! let fallback = ConversationFallback::new(Box::new(provider), &config.assistant);
//!
//! let router = Router::new(intents, Box::new(handlers), fallback, Arc::new(SessionStore::new()));
//! # Ok(())
//! # }
//! ```

pub mod bus;
pub mod catalog;
pub mod config;
pub mod gateway;
pub mod intent;
pub mod provider;
pub mod session;
