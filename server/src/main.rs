//! RPG Bot Server
//!
//! A chat-driven text RPG: players talk to a Telegram bot, the server runs
//! battles and progression and keeps every hero in sqlite.

mod battle;
mod commands;
mod config;
mod entities;
mod game;
mod network;
mod persistence;
mod progression;

#[cfg(test)]
mod testing;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use log::{error, info, warn};
use rpg_shared::Content;
use tokio::sync::mpsc;

use crate::config::Config;
use crate::game::{Game, GameSettings};
use crate::network::{run_outbox, run_polling, TelegramClient};
use crate::persistence::{spawn_autosave, Database, PlayerCache};

/// How long pending replies may take to go out on shutdown
const OUTBOX_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("Starting RPG bot server...");

    let config = Config::from_env()?;
    info!("Configuration loaded");
    info!("  Database: {}", config.database_url);
    info!("  Content: {}", config.content_dir.display());

    let content = Content::load_dir(&config.content_dir)
        .with_context(|| format!("failed to load content from {}", config.content_dir.display()))?;
    info!(
        "Loaded {} classes, {} items, {} enemies, {} bosses, {} locations, {} quests",
        content.classes.len(),
        content.items.len(),
        content.enemies.len(),
        content.bosses.len(),
        content.locations.len(),
        content.quests.len()
    );

    let db = Database::connect(&config.database_url)
        .await
        .with_context(|| format!("failed to open database {}", config.database_url))?;
    info!("Database ready");

    let cache = Arc::new(PlayerCache::new());
    let persistence = spawn_autosave(db.clone(), cache.clone(), config.autosave_interval, config.save_debounce);

    let (outbox_tx, outbox_rx) = mpsc::unbounded_channel();
    let game = Arc::new(Game::new(
        Arc::new(content),
        db.clone(),
        cache,
        outbox_tx,
        GameSettings {
            save_debounce: config.save_debounce,
            defeat_rest: config.defeat_rest,
            backup_dir: config.backup_dir.clone(),
        },
    ));

    let client = TelegramClient::new(&config.telegram_api_url, &config.bot_token);
    if let Err(e) = client.delete_webhook(true).await {
        warn!("Could not reset the webhook: {}", e);
    }

    let outbox = tokio::spawn(run_outbox(client.clone(), outbox_rx));
    let polling = tokio::spawn(run_polling(client, game.clone()));
    info!("Server started successfully!");

    tokio::signal::ctrl_c().await.context("failed to listen for ctrl-c")?;
    info!("Shutting down...");

    polling.abort();
    match persistence.shutdown().await {
        Some(report) => info!("Saved {} players on shutdown ({} failed)", report.saved, report.failed),
        None => error!("Autosave task was gone before the final save"),
    }

    // the outbox closes once the last game handle is gone
    drop(game);
    if tokio::time::timeout(OUTBOX_DRAIN_TIMEOUT, outbox).await.is_err() {
        warn!("Pending replies were not delivered before shutdown");
    }
    db.close().await;

    Ok(())
}
