//! In-process cache of active players.
//!
//! The cache is the source of truth while a player is active. The store is
//! only written from here, either debounced after gameplay or forced by
//! the autosave sweep and explicit saves.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use log::{debug, error, info};
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;

use super::database::Database;
use crate::entities::{now_secs, PlayerRecord};
use crate::game::Conversation;

/// A cached player: the record plus where they are in the conversation
#[derive(Debug)]
pub struct Session {
    pub record: PlayerRecord,
    pub mode: Conversation,
    last_save: Option<Instant>,
}

pub type SharedSession = Arc<Mutex<Session>>;

impl Session {
    pub fn new(record: PlayerRecord) -> Self {
        Self {
            record,
            mode: Conversation::Idle,
            last_save: None,
        }
    }

    /// Write the record to the store. A non-forced save within `debounce`
    /// of the previous one is skipped. Returns false only when the store failed.
    pub async fn save(&mut self, db: &Database, force: bool, debounce: Duration) -> bool {
        if !force {
            if let Some(last) = self.last_save {
                if last.elapsed() < debounce {
                    return true;
                }
            }
        }

        match db.save_player(&self.record).await {
            Ok(()) => {
                self.last_save = Some(Instant::now());
                debug!("Saved player {}", self.record.user_id);
                true
            }
            Err(e) => {
                error!("Failed to save player {}: {}", self.record.user_id, e);
                false
            }
        }
    }
}

/// Outcome of a sweep over the cache
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub saved: usize,
    pub failed: usize,
}

/// Player id to session
#[derive(Default)]
pub struct PlayerCache {
    entries: RwLock<HashMap<i64, SharedSession>>,
}

impl PlayerCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, user_id: i64) -> Option<SharedSession> {
        self.entries.read().await.get(&user_id).cloned()
    }

    /// Cached session, else the stored record, else a brand new player
    pub async fn get_or_create(&self, user_id: i64, db: &Database) -> Result<SharedSession, sqlx::Error> {
        if let Some(session) = self.get(user_id).await {
            return Ok(session);
        }

        let record = match db.get_full_player_data(user_id).await? {
            Some(record) => {
                info!("Loaded player {} from the store", user_id);
                record
            }
            None => {
                db.create_player(user_id).await?;
                info!("Created player {}", user_id);
                PlayerRecord::new(user_id, now_secs())
            }
        };

        // another message may have loaded the same player meanwhile
        let mut entries = self.entries.write().await;
        let session = entries
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(Session::new(record))));
        Ok(session.clone())
    }

    pub async fn remove(&self, user_id: i64) -> Option<SharedSession> {
        self.entries.write().await.remove(&user_id)
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Save every cached player. Works on a snapshot of the entries so
    /// players joining or leaving during the sweep are not a problem.
    pub async fn flush_all(&self, db: &Database, force: bool, debounce: Duration) -> FlushReport {
        let sessions: Vec<SharedSession> = self.entries.read().await.values().cloned().collect();

        let results = join_all(sessions.iter().map(|session| async move {
            session.lock().await.save(db, force, debounce).await
        }))
        .await;

        let saved = results.iter().filter(|ok| **ok).count();
        FlushReport {
            saved,
            failed: results.len() - saved,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEBOUNCE: Duration = Duration::from_secs(30);

    async fn open(dir: &tempfile::TempDir) -> Database {
        let url = format!("sqlite://{}", dir.path().join("cache.db").display());
        Database::connect(&url).await.unwrap()
    }

    #[tokio::test]
    async fn test_get_or_create_makes_and_reuses_a_session() {
        let dir = tempfile::tempdir().unwrap();
        let db = open(&dir).await;
        let cache = PlayerCache::new();

        assert!(cache.get(1).await.is_none());
        let first = cache.get_or_create(1, &db).await.unwrap();
        let second = cache.get_or_create(1, &db).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len().await, 1);

        // the store row exists right away
        assert!(db.get_full_player_data(1).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_stored_player_is_rehydrated() {
        let dir = tempfile::tempdir().unwrap();
        let db = open(&dir).await;
        let mut record = PlayerRecord::new(2, 0.0);
        record.gold = 777;
        db.save_player(&record).await.unwrap();

        let cache = PlayerCache::new();
        let session = cache.get_or_create(2, &db).await.unwrap();
        assert_eq!(session.lock().await.record.gold, 777);
    }

    #[tokio::test]
    async fn test_save_is_debounced_unless_forced() {
        let dir = tempfile::tempdir().unwrap();
        let db = open(&dir).await;
        let mut session = Session::new(PlayerRecord::new(3, 0.0));

        assert!(session.save(&db, false, DEBOUNCE).await);
        session.record.gold = 1;
        assert!(session.save(&db, false, DEBOUNCE).await);
        assert_eq!(db.get_full_player_data(3).await.unwrap().unwrap().gold, 50);

        assert!(session.save(&db, true, DEBOUNCE).await);
        assert_eq!(db.get_full_player_data(3).await.unwrap().unwrap().gold, 1);
    }

    #[tokio::test]
    async fn test_failed_save_reports_false() {
        let dir = tempfile::tempdir().unwrap();
        let db = open(&dir).await;
        db.close().await;

        let mut session = Session::new(PlayerRecord::new(4, 0.0));
        assert!(!session.save(&db, true, DEBOUNCE).await);
    }

    #[tokio::test]
    async fn test_flush_all_saves_every_entry() {
        let dir = tempfile::tempdir().unwrap();
        let db = open(&dir).await;
        let cache = PlayerCache::new();
        for id in [10, 11, 12] {
            let session = cache.get_or_create(id, &db).await.unwrap();
            session.lock().await.record.gold = id as u64;
        }

        let report = cache.flush_all(&db, true, DEBOUNCE).await;
        assert_eq!(report, FlushReport { saved: 3, failed: 0 });
        for id in [10, 11, 12] {
            assert_eq!(db.get_full_player_data(id).await.unwrap().unwrap().gold, id as u64);
        }

        assert!(cache.remove(11).await.is_some());
        assert_eq!(cache.flush_all(&db, true, DEBOUNCE).await.saved, 2);
    }
}
