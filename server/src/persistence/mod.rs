//! Persistence layer for the game server.
//!
//! Players live in the [`PlayerCache`] while active and are written to the
//! sqlite [`Database`] in the background. The autosave task owns the
//! periodic sweep and the final flush on shutdown.

mod cache;
mod database;

pub use cache::{FlushReport, PlayerCache, Session, SharedSession};
pub use database::Database;

use std::sync::Arc;
use std::time::Duration;

use log::{error, info, warn};
use tokio::sync::{mpsc, oneshot};

/// Commands sent to the autosave background task
#[derive(Debug)]
pub enum PersistenceCommand {
    /// Save every cached player now
    FlushAll {
        response: oneshot::Sender<FlushReport>,
    },
    /// Final forced flush, then stop the task
    Shutdown {
        response: oneshot::Sender<FlushReport>,
    },
}

/// Handle for sending commands to the autosave task
#[derive(Clone)]
pub struct PersistenceHandle {
    sender: mpsc::Sender<PersistenceCommand>,
}

impl PersistenceHandle {
    /// Flush everything and wait for the result
    pub async fn flush_all(&self) -> Option<FlushReport> {
        let (tx, rx) = oneshot::channel();
        self.sender.send(PersistenceCommand::FlushAll { response: tx }).await.ok()?;
        rx.await.ok()
    }

    /// Flush everything and stop the task
    pub async fn shutdown(&self) -> Option<FlushReport> {
        let (tx, rx) = oneshot::channel();
        self.sender.send(PersistenceCommand::Shutdown { response: tx }).await.ok()?;
        rx.await.ok()
    }
}

/// Spawn the autosave task. It sweeps the cache every `interval`.
pub fn spawn_autosave(db: Database, cache: Arc<PlayerCache>, interval: Duration, debounce: Duration) -> PersistenceHandle {
    let (tx, rx) = mpsc::channel(16);
    tokio::spawn(autosave_task(db, cache, interval, debounce, rx));
    info!("Autosave task started (every {}s)", interval.as_secs());
    PersistenceHandle { sender: tx }
}

async fn autosave_task(
    db: Database,
    cache: Arc<PlayerCache>,
    interval: Duration,
    debounce: Duration,
    mut rx: mpsc::Receiver<PersistenceCommand>,
) {
    let mut ticker = tokio::time::interval(interval);
    // the first tick completes immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let report = cache.flush_all(&db, true, debounce).await;
                log_report("Autosave", report);
            }
            command = rx.recv() => match command {
                Some(PersistenceCommand::FlushAll { response }) => {
                    let report = cache.flush_all(&db, true, debounce).await;
                    log_report("Flush", report);
                    let _ = response.send(report);
                }
                Some(PersistenceCommand::Shutdown { response }) => {
                    let report = cache.flush_all(&db, true, debounce).await;
                    log_report("Final save", report);
                    let _ = response.send(report);
                    break;
                }
                None => {
                    warn!("Persistence handle dropped, running a final save");
                    let report = cache.flush_all(&db, true, debounce).await;
                    log_report("Final save", report);
                    break;
                }
            }
        }
    }

    info!("Autosave task stopped");
}

fn log_report(what: &str, report: FlushReport) {
    if report.failed > 0 {
        error!("{}: {} players saved, {} failed", what, report.saved, report.failed);
    } else if report.saved > 0 {
        info!("{}: {} players saved", what, report.saved);
    }
}
