// This is the entry point of the inactivity bot.
//
// **Architecture Overview:**
// - `core/` = Business logic (platform-agnostic)
// - `infra/` = Implementations of core traits (databases)
// - `discord/` = Discord-specific adapters (platform port, events)
//
// This file's job is to:
// 1. Load configuration
// 2. Initialize services (dependency injection)
// 3. Set up the Discord framework
// 4. Register event handlers and background tasks

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with half a dozen mod.rs files that all look the same.
#[path = "core/core_layer.rs"]
mod core;
#[path = "discord/discord_layer.rs"]
mod discord;
#[path = "infra/infra_layer.rs"]
mod infra;

mod config;

use crate::config::BotConfig;
use crate::core::inactivity::{ActivityStore, InactivityService};
use crate::discord::{events, presence, sweep_task, Data, Error};
use crate::infra::inactivity::{InMemoryActivityStore, SqliteActivityStore};
use anyhow::Context as _;
use poise::serenity_prelude as serenity;
use std::sync::Arc;
use tracing_subscriber::filter::{filter_fn, EnvFilter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // Shard heartbeats are noisy and never actionable for this bot.
    let fmt_layer = tracing_subscriber::fmt::layer().with_filter(filter_fn(|metadata| {
        let target = metadata.target();
        !(target.starts_with("serenity::gateway::bridge::shard_manager")
            || target.starts_with("serenity::gateway::bridge::shard_runner"))
    }));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

async fn build_store(config: &BotConfig) -> anyhow::Result<Arc<dyn ActivityStore>> {
    if config.uses_memory_store() {
        tracing::warn!("Using the in-memory store; nothing will survive a restart");
        return Ok(Arc::new(InMemoryActivityStore::new()));
    }

    let store = SqliteActivityStore::new(&config.database_url, config.connect_timeout)
        .await
        .with_context(|| format!("Failed to open database at {}", config.database_url))?;
    tracing::info!(database_url = %config.database_url, "Connected to database");
    Ok(Arc::new(store))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file (if it exists)
    dotenv::dotenv().ok();

    // Initialize logging so we can see what's happening
    init_tracing();

    let config = BotConfig::load()?;

    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================
    // This is the "composition root" where we wire everything together.

    let store = build_store(&config).await?;
    let inactivity_service = Arc::new(InactivityService::new(
        store,
        config.command_prefix.clone(),
    ));

    let data = Data {
        inactivity: Arc::clone(&inactivity_service),
        command_prefix: config.command_prefix.clone(),
        sweep_interval: config.sweep_interval,
        guild_pause: config.guild_pause,
    };

    // ========================================================================
    // DISCORD FRAMEWORK SETUP
    // ========================================================================
    // Owner commands are plain prefixed messages, so poise only supplies the
    // event plumbing and the setup hook.

    let intents = serenity::GatewayIntents::GUILD_MESSAGES
        | serenity::GatewayIntents::MESSAGE_CONTENT // Required to read commands
        | serenity::GatewayIntents::GUILDS
        | serenity::GatewayIntents::GUILD_MEMBERS
        | serenity::GatewayIntents::GUILD_VOICE_STATES;

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: Vec::<poise::Command<Data, Error>>::new(),
            event_handler: |ctx, event, framework, data| {
                Box::pin(events::event_handler(ctx, event, framework, data))
            },
            ..Default::default()
        })
        .setup(|ctx, _ready, _framework| {
            Box::pin(async move {
                tracing::info!("Bot is ready");
                presence::refresh(ctx, &data).await;
                sweep_task::spawn(ctx, &data);
                Ok(data)
            })
        })
        .build();

    let mut client = serenity::ClientBuilder::new(&config.token, intents)
        .framework(framework)
        .await
        .context("Error creating client")?;

    client.start().await.context("Error running bot")?;
    Ok(())
}
