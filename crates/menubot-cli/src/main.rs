//! 🍔 menubot CLI — console chat, Telegram bot, onboarding and status.
//!
//! Usage:
//!   menubot chat             — Chat with the assistant in the terminal
//!   menubot bot              — Run the Telegram bot
//!   menubot classify <text>  — Show which intent a message selects
//!   menubot onboard          — Create a default configuration and catalog
//!   menubot status           — Show current configuration and health

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use menubot_core::bus::MessageBus;
use menubot_core::catalog::store::SAMPLE_CATALOG;
use menubot_core::catalog::{CatalogHandlers, InMemoryCatalog};
use menubot_core::config::Config;
use menubot_core::gateway::{RouterBridge, Transport};
use menubot_core::intent::matcher;
use menubot_core::intent::router::extract_args;
use menubot_core::intent::{Classification, ConversationFallback, IntentCatalog, Router, RouterOutcome};
use menubot_core::provider::openai::OpenAiProvider;
use menubot_core::session::{session_key, SessionStore};
#[cfg(feature = "telegram")]
use menubot_core::gateway::channels::telegram::TelegramTransport;

#[derive(Parser)]
#[command(
    name = "menubot",
    version,
    about = "A food-ordering chat assistant",
    long_about = "🍔 menubot — answers menu, price and stock questions with pattern-based intents \
                  and hands everything else to a conversational model."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the assistant in the terminal
    Chat {
        /// Session name (default: "default")
        #[arg(short, long, default_value = "default")]
        session: String,

        /// Model to use (overrides config)
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Run the Telegram bot until Ctrl+C
    Bot,

    /// Print the intent a message selects, without answering it
    Classify {
        /// Message text
        text: Vec<String>,
    },

    /// Create or reset the default configuration
    Onboard,

    /// Show configuration status and health
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Chat { session, model }) => cmd_chat(&session, model.as_deref()).await?,
        Some(Commands::Bot) => cmd_bot().await?,
        Some(Commands::Classify { text }) => cmd_classify(&text.join(" "))?,
        Some(Commands::Onboard) => cmd_onboard()?,
        Some(Commands::Status) => cmd_status()?,
        None => cmd_chat("default", None).await?,
    }

    Ok(())
}

// ── Shared Setup ────────────────────────────────────────────────────

fn validate_config(config: &Config) -> Result<()> {
    if let Err(errors) = config.validate() {
        eprintln!("\n  \x1b[31m❌ Configuration errors:\x1b[0m");
        for e in &errors {
            eprintln!("     • {}", e);
        }
        eprintln!();
        anyhow::bail!("Fix the above {} error(s) in config.json", errors.len());
    }
    Ok(())
}

/// Build the router: provider, catalog, intents and fallback, sharing
/// `sessions` with whoever else needs them.
fn setup_router(
    config: &Config,
    model_override: Option<&str>,
    sessions: Arc<SessionStore>,
) -> Result<Router> {
    let (name, entry) = config.providers.find_active().context(
        "No LLM provider configured with a real API key. \
         Run `menubot onboard` first, then edit config.json",
    )?;

    let mut assistant = config.assistant.clone();
    assistant.model = config.effective_model(model_override).to_string();

    let provider = OpenAiProvider::new(
        name,
        &entry.api_key,
        entry.api_base.as_deref(),
        &assistant.model,
        reqwest::Client::new(),
    );

    let catalog_path = config.catalog_path();
    let catalog = InMemoryCatalog::load(&catalog_path).with_context(|| {
        format!(
            "Could not load the catalog at {}. Run `menubot onboard` to create a sample one",
            catalog_path.display()
        )
    })?;

    let handlers = CatalogHandlers::new(Arc::new(catalog), &config.catalog);
    let intents = IntentCatalog::with_bindings(&config.intents.bindings)?;
    let fallback = ConversationFallback::new(Box::new(provider), &assistant);

    Ok(Router::new(intents, Box::new(handlers), fallback, sessions))
}

// ── Bot Command ─────────────────────────────────────────────────────

async fn cmd_bot() -> Result<()> {
    let config = Config::load()?;
    validate_config(&config)?;

    let sessions = Arc::new(SessionStore::new());
    let router = Arc::new(setup_router(&config, None, Arc::clone(&sessions))?);

    let (bus, receivers) = MessageBus::new(100);
    let bus_arc = Arc::new(bus);

    let mut tasks = Vec::new();
    let inbound_rx = receivers.inbound_rx;

    // 1. Start transports FIRST so they register their outbound subscribers
    //    before the dispatch loop begins processing messages.
    #[cfg(feature = "telegram")]
    {
        if let Some(ref tel_config) = config.channels.telegram {
            if tel_config.enabled && !tel_config.token.is_empty() {
                let transport = TelegramTransport::new(
                    tel_config.token.clone(),
                    Arc::clone(&bus_arc),
                    Arc::clone(&sessions),
                    tel_config.allow_from.clone(),
                );
                tasks.push(tokio::spawn(async move {
                    if let Err(e) = transport.run().await {
                        tracing::error!("Telegram transport failed: {}", e);
                    }
                }));
            }
        }
    }

    if tasks.is_empty() {
        println!("  ⚠️ No bot channels enabled. Please check your config.");
        return Ok(());
    }

    // 2. Outbound dispatcher
    let subs = bus_arc.subscribers();
    tasks.push(tokio::spawn(async move {
        menubot_core::bus::dispatch_outbound(subs, receivers.outbound_rx).await;
    }));

    // 3. Router bridge, cancelled on Ctrl+C
    let cancel = CancellationToken::new();
    let bridge = RouterBridge::new(Arc::clone(&bus_arc), router, cancel.clone());
    tasks.push(tokio::spawn(async move {
        if let Err(e) = bridge.run(inbound_rx).await {
            tracing::error!("Router bridge failed: {}", e);
        }
    }));

    println!("  🍔 menubot bot mode starting...");
    println!(
        "  Active channels: Telegram: {}",
        config.channels.telegram.as_ref().map_or(false, |c| c.enabled)
    );
    println!("  Press Ctrl+C for graceful shutdown.");
    println!("  ─────────────────────────────────────");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            println!("\n  ⏳ Shutting down gracefully...");
            cancel.cancel();
        }
        _ = async { futures::future::join_all(tasks).await } => {
            // All tasks finished on their own.
        }
    }

    println!("  ✅ Shutdown complete.");
    Ok(())
}

// ── Chat Command ────────────────────────────────────────────────────

/// Prints replies to the terminal. There is nothing to delete on a console.
struct ConsoleTransport;

#[async_trait]
impl Transport for ConsoleTransport {
    async fn reply(&self, text: &str) -> Result<()> {
        println!("  \x1b[32m{}\x1b[0m\n", text.replace('\n', "\n  "));
        Ok(())
    }

    async fn delete(&self, message_id: &str) -> Result<()> {
        tracing::debug!(message_id, "Console has no messages to delete");
        Ok(())
    }
}

async fn cmd_chat(session: &str, model_override: Option<&str>) -> Result<()> {
    let config = Config::load()?;
    validate_config(&config)?;

    let router = setup_router(&config, model_override, Arc::new(SessionStore::new()))?;
    let key = session_key("cli", session);
    let transport = ConsoleTransport;

    let provider = config
        .providers
        .find_active()
        .map(|(name, _)| name)
        .unwrap_or("none");
    let model = config.effective_model(model_override);

    println!();
    println!("  🍔 menubot v{}", env!("CARGO_PKG_VERSION"));
    println!("  Provider: {} | Model: {}", provider, model);
    println!("  Session: {} | Catalog: {}", session, config.catalog_path().display());
    println!();
    println!("  Ask about the menu, or type 'salir' (or /quit) to exit.");
    println!("  ─────────────────────────────────────");
    println!();

    let stdin = io::stdin();
    loop {
        print!("  \x1b[36m>\x1b[0m ");
        io::stdout().flush()?;

        let mut input = String::new();
        if stdin.read_line(&mut input)? == 0 {
            break;
        }
        let input = input.trim();

        if input.is_empty() {
            continue;
        }

        match input {
            "/quit" | "/exit" | "/q" => {
                router.exit(&key, &transport).await;
                break;
            }
            "/status" => {
                cmd_status()?;
                continue;
            }
            _ => {}
        }

        println!();
        if router.route(&key, input, &transport).await == RouterOutcome::Exited {
            break;
        }
    }

    Ok(())
}

// ── Classify Command ────────────────────────────────────────────────

fn cmd_classify(text: &str) -> Result<()> {
    let config = Config::load()?;
    let intents = IntentCatalog::with_bindings(&config.intents.bindings)?;
    let normalized = matcher::normalize(text);

    println!();
    println!("  Message:   {}", normalized);
    match intents.classify(&normalized) {
        Classification::Exit => println!("  Intent:    exit (session ends)"),
        Classification::Intent(intent, m) => {
            println!("  Intent:    {}", intent.name);
            println!("  Handler:   {}", intent.handler);
            println!("  Pattern:   {}", m.pattern);
            match extract_args(intent.extraction, &m) {
                Ok(args) => println!("  Arguments: {:?}", args),
                Err(raw) => println!("  Arguments: ❌ invalid quantity {:?}", raw),
            }
        }
        Classification::NoMatch => println!("  Intent:    none (conversational fallback)"),
    }
    println!();
    Ok(())
}

// ── Onboard Command ─────────────────────────────────────────────────

fn cmd_onboard() -> Result<()> {
    let path = Config::write_default_template()?;
    println!();
    println!("  ✅ Configuration created at:");
    println!("     {}", path.display());

    let catalog_path = Config::load()?.catalog_path();
    if catalog_path.exists() {
        println!("  Catalog already present at {}", catalog_path.display());
    } else {
        if let Some(parent) = catalog_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&catalog_path, SAMPLE_CATALOG)?;
        println!("  ✅ Sample catalog written to:");
        println!("     {}", catalog_path.display());
    }

    println!();
    println!("  Next steps:");
    println!("  1. Edit the config file and add your API key (or set OPENAI_API_KEY)");
    println!("  2. Replace the sample catalog with your restaurant's menu");
    println!("  3. Run `menubot chat` to start chatting");
    println!();
    Ok(())
}

// ── Status Command ──────────────────────────────────────────────────

fn cmd_status() -> Result<()> {
    let config_path = Config::default_path();
    let config = Config::load()?;

    println!();
    println!("  🍔 menubot status");
    println!("  ─────────────────────────────────────");

    if config_path.exists() {
        println!("  Config:    {}", config_path.display());
    } else {
        println!("  Config:    ❌ Not found (run `menubot onboard`)");
        return Ok(());
    }

    match config.providers.find_active() {
        Some((name, _)) => println!("  Provider:  ✅ {} configured", name),
        None => println!("  Provider:  ❌ No provider configured"),
    }

    println!("  Model:     {}", config.effective_model(None));

    let catalog_path = config.catalog_path();
    match InMemoryCatalog::load(&catalog_path) {
        Ok(catalog) => println!(
            "  Catalog:   ✅ {} ({} categories, {} products)",
            catalog_path.display(),
            catalog.data().categories.len(),
            catalog.data().products.len()
        ),
        Err(e) => println!("  Catalog:   ❌ {}", e),
    }

    match IntentCatalog::with_bindings(&config.intents.bindings) {
        Ok(intents) => println!("  Intents:   {} loaded", intents.intents().len()),
        Err(e) => println!("  Intents:   ❌ {}", e),
    }

    let telegram = match config.channels.telegram {
        Some(ref t) if t.enabled => "✅ enabled",
        _ => "disabled",
    };
    println!("  Telegram:  {}", telegram);

    if let Err(errors) = config.validate() {
        println!("  Problems:");
        for e in errors {
            println!("     • {}", e);
        }
    }

    println!();
    Ok(())
}
