//! Configuration module for menubot.
//!
//! Loads typed configuration from `~/.menubot/config.json`.
//! All fields use `serde` for zero-boilerplate deserialization.

use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Environment variable consulted when no provider entry carries a key.
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub providers: ProvidersConfig,
    pub assistant: AssistantConfig,
    pub catalog: CatalogConfig,
    pub intents: IntentsConfig,
    pub channels: ChannelsConfig,
}

impl Config {
    /// Load configuration from the default path (`~/.menubot/config.json`).
    ///
    /// `OPENAI_API_KEY` is honoured as a last-resort provider key.
    pub fn load() -> anyhow::Result<Self> {
        let path = Self::default_path();
        let mut config = if path.exists() {
            Self::load_from(&path)?
        } else {
            Config::default()
        };
        config.providers = config.providers.with_env_fallback();
        Ok(config)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Get the default config file path.
    pub fn default_path() -> PathBuf {
        Self::config_dir().join("config.json")
    }

    /// Get the default config directory path.
    pub fn config_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".menubot")
    }

    /// Resolved path of the catalog JSON file (`~/` expanded).
    pub fn catalog_path(&self) -> PathBuf {
        expand_home(&self.catalog.path)
    }

    /// Model the fallback talks to: `model_override`, then the active
    /// provider's own `model`, then `assistant.model`.
    pub fn effective_model<'a>(&'a self, model_override: Option<&'a str>) -> &'a str {
        model_override
            .or_else(|| {
                self.providers
                    .find_active()
                    .and_then(|(_, entry)| entry.model.as_deref())
            })
            .unwrap_or(&self.assistant.model)
    }

    /// Check the configuration for problems that would prevent startup.
    ///
    /// Returns every problem found, not only the first one.
    pub fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.providers.find_active().is_none() {
            errors.push(format!(
                "No LLM provider configured with a real API key. \
                 Edit config.json or set {}.",
                OPENAI_API_KEY_ENV
            ));
        }

        if self.assistant.model.is_empty() {
            errors.push("assistant.model is empty. Specify a model name.".into());
        }

        if self.catalog.recommendation_limit == 0 {
            errors.push("catalog.recommendationLimit must be at least 1.".into());
        }

        if let Some(ref tg) = self.channels.telegram {
            if tg.enabled && (tg.token.is_empty() || tg.token.contains("YOUR_")) {
                errors.push(
                    "Telegram is enabled but the bot token is missing or a placeholder. \
                     Set channels.telegram.token in config.json."
                        .into(),
                );
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Write the default config template to disk.
    pub fn write_default_template() -> anyhow::Result<PathBuf> {
        let path = Self::default_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let template = serde_json::json!({
            "providers": {
                "openai": {
                    "apiKey": "sk-YOUR_KEY_HERE"
                }
            },
            "assistant": {
                "model": "gpt-3.5-turbo"
            },
            "catalog": {
                "path": "~/.menubot/catalog.json",
                "recommendationLimit": 3
            },
            "channels": {
                "telegram": {
                    "enabled": false,
                    "token": "YOUR_BOT_TOKEN",
                    "allowFrom": []
                }
            }
        });

        std::fs::write(&path, serde_json::to_string_pretty(&template)?)?;
        Ok(path)
    }
}

fn expand_home(raw: &str) -> PathBuf {
    if raw.starts_with("~/") || raw.starts_with("~\\") {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(&raw[2..])
    } else {
        PathBuf::from(raw)
    }
}

// ── Provider Configuration ──────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProviderEntry {
    pub api_key: String,
    pub api_base: Option<String>,
    /// Per-provider model override.
    pub model: Option<String>,
}

impl ProviderEntry {
    fn has_real_key(&self) -> bool {
        !self.api_key.is_empty() && !self.api_key.contains("YOUR_")
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub openai: Option<ProviderEntry>,
    pub openrouter: Option<ProviderEntry>,
    pub deepseek: Option<ProviderEntry>,
    pub groq: Option<ProviderEntry>,
    pub vllm: Option<ProviderEntry>,
    /// Entry synthesized from `OPENAI_API_KEY` when nothing else is set.
    #[serde(skip)]
    env_openai: Option<ProviderEntry>,
}

impl ProvidersConfig {
    /// Find the first configured provider with a real API key.
    ///
    /// Falls back to `OPENAI_API_KEY` from the environment.
    pub fn find_active(&self) -> Option<(&str, &ProviderEntry)> {
        let candidates: [(&str, &Option<ProviderEntry>); 5] = [
            ("openai", &self.openai),
            ("openrouter", &self.openrouter),
            ("deepseek", &self.deepseek),
            ("groq", &self.groq),
            ("vllm", &self.vllm),
        ];

        for (name, entry) in candidates {
            if let Some(e) = entry {
                if e.has_real_key() {
                    return Some((name, e));
                }
            }
        }

        self.env_openai
            .as_ref()
            .filter(|e| e.has_real_key())
            .map(|e| ("openai", e))
    }

    /// Pick up `OPENAI_API_KEY` as a last-resort provider.
    pub fn with_env_fallback(mut self) -> Self {
        self.env_openai = std::env::var(OPENAI_API_KEY_ENV)
            .ok()
            .map(|api_key| ProviderEntry {
                api_key,
                ..ProviderEntry::default()
            });
        self
    }
}

// ── Assistant Configuration ─────────────────────────────────────────

/// Rule set the system instruction is built from.
pub const DEFAULT_RULES: &[&str] = &[
    "Eres el asistente virtual de un restaurante y respondes siempre en español.",
    "Ayudas a los clientes a conocer el menú, los productos más vendidos, los precios y la disponibilidad.",
    "Responde de forma breve, amable y clara.",
    "No inventes productos, precios ni existencias; si no conoces un dato, sugiere escribir 'ver menú'.",
    "Si el cliente pregunta por temas ajenos al restaurante, redirige la conversación con cortesía.",
    "Para terminar la conversación el cliente puede escribir 'salir'.",
];

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AssistantConfig {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub rules: Vec<String>,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            model: "gpt-3.5-turbo".into(),
            max_tokens: 512,
            temperature: 0.7,
            rules: DEFAULT_RULES.iter().map(|r| r.to_string()).collect(),
        }
    }
}

impl AssistantConfig {
    /// The system instruction: every rule joined with a single space.
    pub fn system_instruction(&self) -> String {
        self.rules.join(" ")
    }
}

// ── Catalog Configuration ───────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CatalogConfig {
    pub path: String,
    pub recommendation_limit: usize,
    pub max_recommended_price: Option<Decimal>,
    /// Category kind (e.g. `"drink"`) to slug overrides.
    pub category_slugs: HashMap<String, String>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            path: "~/.menubot/catalog.json".into(),
            recommendation_limit: 3,
            max_recommended_price: None,
            category_slugs: HashMap::new(),
        }
    }
}

// ── Intent Configuration ────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct IntentsConfig {
    /// Intent name to handler name, e.g. `"product_order": "stock_for_order"`.
    pub bindings: HashMap<String, String>,
}

// ── Channels Configuration ──────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ChannelsConfig {
    pub telegram: Option<TelegramConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TelegramConfig {
    pub enabled: bool,
    pub token: String,
    pub allow_from: Vec<String>,
}
