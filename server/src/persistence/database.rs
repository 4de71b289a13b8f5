//! SQLite player record store.
//!
//! Every collection of a player lives in its own table keyed by
//! `(user_id, secondary id)`, so each single operation is an idempotent
//! upsert. A full [`Database::save_player`] rewrites all of them in one
//! transaction.

use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use log::warn;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use rpg_shared::StatBlock;

use crate::entities::{Effect, EffectLedger, PlayerRecord};

/// Stats stored for a freshly created player
const DEFAULT_STATS: StatBlock = StatBlock { health: 100, attack: 10, defense: 5 };

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS players (
    user_id INTEGER PRIMARY KEY,
    class_id TEXT,
    level INTEGER NOT NULL DEFAULT 1,
    experience INTEGER NOT NULL DEFAULT 0,
    gold INTEGER NOT NULL DEFAULT 50,
    artifact_slots INTEGER NOT NULL DEFAULT 1,
    location TEXT NOT NULL DEFAULT 'class_selection',
    current_city TEXT NOT NULL DEFAULT 'village_square',
    last_location TEXT NOT NULL DEFAULT 'village_square',
    fatigue REAL NOT NULL DEFAULT 100,
    last_fatigue_update REAL NOT NULL DEFAULT 0,
    camp_entry_time REAL,
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);
CREATE TABLE IF NOT EXISTS player_stats (
    user_id INTEGER PRIMARY KEY,
    health INTEGER NOT NULL,
    attack INTEGER NOT NULL,
    defense INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS inventory (
    user_id INTEGER NOT NULL,
    item_id TEXT NOT NULL,
    quantity INTEGER NOT NULL DEFAULT 1,
    equipped INTEGER NOT NULL DEFAULT 0,
    UNIQUE (user_id, item_id)
);
CREATE TABLE IF NOT EXISTS active_quests (
    user_id INTEGER NOT NULL,
    quest_id TEXT NOT NULL,
    UNIQUE (user_id, quest_id)
);
CREATE TABLE IF NOT EXISTS completed_quests (
    user_id INTEGER NOT NULL,
    quest_id TEXT NOT NULL,
    UNIQUE (user_id, quest_id)
);
CREATE TABLE IF NOT EXISTS active_effects (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    effect_data TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS story_progress (
    user_id INTEGER NOT NULL,
    city TEXT NOT NULL,
    scene_id TEXT NOT NULL,
    UNIQUE (user_id, city)
);
CREATE TABLE IF NOT EXISTS unlocked_locations (
    user_id INTEGER NOT NULL,
    location_id TEXT NOT NULL,
    UNIQUE (user_id, location_id)
);
CREATE TABLE IF NOT EXISTS defeated_bosses (
    user_id INTEGER NOT NULL,
    boss_id TEXT NOT NULL,
    UNIQUE (user_id, boss_id)
);
CREATE TABLE IF NOT EXISTS kill_counts (
    user_id INTEGER NOT NULL,
    enemy_id TEXT NOT NULL,
    count INTEGER NOT NULL DEFAULT 0,
    UNIQUE (user_id, enemy_id)
);
CREATE TABLE IF NOT EXISTS player_abilities (
    user_id INTEGER NOT NULL,
    ability TEXT NOT NULL,
    UNIQUE (user_id, ability)
)
"#;

/// Tables holding per-player collections, cleared on a full save or reset
const COLLECTION_TABLES: [&str; 10] = [
    "inventory",
    "active_quests",
    "completed_quests",
    "active_effects",
    "story_progress",
    "unlocked_locations",
    "defeated_bosses",
    "kill_counts",
    "player_abilities",
    "player_stats",
];

/// Database connection wrapper
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if needed) the database and make sure the schema exists
    pub async fn connect(url: &str) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.init_schema().await?;
        Ok(db)
    }

    async fn init_schema(&self) -> Result<(), sqlx::Error> {
        for statement in SCHEMA.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Close the pool. Later operations fail.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    // =========================================================================
    // Player Lifecycle
    // =========================================================================

    /// Create the player rows if they do not exist yet
    pub async fn create_player(&self, user_id: i64) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT OR IGNORE INTO players (user_id) VALUES (?)")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("INSERT OR IGNORE INTO player_stats (user_id, health, attack, defense) VALUES (?, ?, ?, ?)")
            .bind(user_id)
            .bind(DEFAULT_STATS.health)
            .bind(DEFAULT_STATS.attack)
            .bind(DEFAULT_STATS.defense)
            .execute(&mut *tx)
            .await?;
        unlock_location_with(&mut tx, user_id, rpg_shared::START_LOCATION).await?;

        tx.commit().await?;
        Ok(())
    }

    /// Delete every row of a player and create it again with defaults
    pub async fn reset_player(&self, user_id: i64) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        clear_collections(&mut tx, user_id).await?;
        sqlx::query("DELETE FROM players WHERE user_id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        self.create_player(user_id).await
    }

    /// Load the whole record, or None for an unknown player
    pub async fn get_full_player_data(&self, user_id: i64) -> Result<Option<PlayerRecord>, sqlx::Error> {
        let Some(core) = sqlx::query(
            "SELECT class_id, level, experience, gold, artifact_slots, location, current_city,
                    last_location, fatigue, last_fatigue_update, camp_entry_time
             FROM players WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        else {
            return Ok(None);
        };

        let mut record = PlayerRecord::new(user_id, core.try_get("last_fatigue_update")?);
        record.class_id = core.try_get("class_id")?;
        record.level = core.try_get::<i64, _>("level")?.max(1) as u32;
        record.experience = core.try_get::<i64, _>("experience")?.max(0) as u64;
        record.gold = core.try_get::<i64, _>("gold")?.max(0) as u64;
        record.artifact_slots = core.try_get::<i64, _>("artifact_slots")?.max(0) as u32;
        record.location = core.try_get("location")?;
        record.current_city = core.try_get("current_city")?;
        record.last_location = core.try_get("last_location")?;
        record.fatigue = core.try_get("fatigue")?;
        record.camp_entry_time = core.try_get("camp_entry_time")?;

        if let Some(stats) = sqlx::query("SELECT health, attack, defense FROM player_stats WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
        {
            record.base_stats = StatBlock::new(stats.try_get("health")?, stats.try_get("attack")?, stats.try_get("defense")?);
        }

        for row in sqlx::query("SELECT item_id, quantity, equipped FROM inventory WHERE user_id = ?")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?
        {
            let item_id: String = row.try_get("item_id")?;
            let quantity: i64 = row.try_get("quantity")?;
            if quantity <= 0 {
                continue;
            }
            if row.try_get::<bool, _>("equipped")? {
                record.equipped_artifacts.insert(item_id.clone());
            }
            record.inventory.insert(item_id, quantity as u32);
        }

        record.active_quests = self.load_set("SELECT quest_id FROM active_quests WHERE user_id = ?", user_id).await?;
        record.completed_quests = self.load_set("SELECT quest_id FROM completed_quests WHERE user_id = ?", user_id).await?;
        record.abilities = self.load_set("SELECT ability FROM player_abilities WHERE user_id = ?", user_id).await?;
        record.defeated_bosses = self.load_set("SELECT boss_id FROM defeated_bosses WHERE user_id = ?", user_id).await?;
        record.unlocked_locations = self.load_set("SELECT location_id FROM unlocked_locations WHERE user_id = ?", user_id).await?;
        record.visited_locations = record.unlocked_locations.clone();

        let mut effects = Vec::new();
        for row in sqlx::query("SELECT effect_data FROM active_effects WHERE user_id = ? ORDER BY id")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?
        {
            let data: String = row.try_get("effect_data")?;
            match serde_json::from_str::<Effect>(&data) {
                Ok(effect) => effects.push(effect),
                Err(e) => warn!("Dropping unreadable effect of player {}: {}", user_id, e),
            }
        }
        record.effects = EffectLedger::from_effects(effects);

        let mut story_progress = BTreeMap::new();
        for row in sqlx::query("SELECT city, scene_id FROM story_progress WHERE user_id = ?")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?
        {
            story_progress.insert(row.try_get("city")?, row.try_get("scene_id")?);
        }
        record.story_progress = story_progress;

        let mut kill_counts = BTreeMap::new();
        for row in sqlx::query("SELECT enemy_id, count FROM kill_counts WHERE user_id = ?")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?
        {
            kill_counts.insert(row.try_get("enemy_id")?, row.try_get::<i64, _>("count")?.max(0) as u32);
        }
        record.kill_counts = kill_counts;

        Ok(Some(record))
    }

    async fn load_set(&self, sql: &str, user_id: i64) -> Result<BTreeSet<String>, sqlx::Error> {
        let rows = sqlx::query(sql).bind(user_id).fetch_all(&self.pool).await?;
        rows.iter().map(|row| row.try_get::<String, _>(0)).collect()
    }

    /// Write the complete record in one transaction
    pub async fn save_player(&self, record: &PlayerRecord) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let user_id = record.user_id;

        sqlx::query("INSERT OR IGNORE INTO players (user_id) VALUES (?)")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        update_core_with(&mut tx, record).await?;
        clear_collections(&mut tx, user_id).await?;
        update_stats_with(&mut tx, user_id, record.base_stats).await?;

        for (item_id, quantity) in &record.inventory {
            add_item_with(&mut tx, user_id, item_id, *quantity).await?;
            if record.equipped_artifacts.contains(item_id) {
                set_equipped_with(&mut tx, user_id, item_id, true).await?;
            }
        }
        for quest_id in &record.active_quests {
            start_quest_with(&mut tx, user_id, quest_id).await?;
        }
        for quest_id in &record.completed_quests {
            complete_quest_with(&mut tx, user_id, quest_id).await?;
        }
        for effect in record.effects.iter() {
            add_effect_with(&mut tx, user_id, effect).await?;
        }
        for (city, scene_id) in &record.story_progress {
            update_story_progress_with(&mut tx, user_id, city, scene_id).await?;
        }
        for location_id in record.unlocked_locations.union(&record.visited_locations) {
            unlock_location_with(&mut tx, user_id, location_id).await?;
        }
        for boss_id in &record.defeated_bosses {
            add_defeated_boss_with(&mut tx, user_id, boss_id).await?;
        }
        for (enemy_id, count) in &record.kill_counts {
            add_kills_with(&mut tx, user_id, enemy_id, *count).await?;
        }
        for ability in &record.abilities {
            add_ability_with(&mut tx, user_id, ability).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    // =========================================================================
    // Single Operations
    // =========================================================================

    pub async fn update_player_core(&self, record: &PlayerRecord) -> Result<(), sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        update_core_with(&mut conn, record).await
    }

    pub async fn update_player_stats(&self, user_id: i64, stats: StatBlock) -> Result<(), sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        update_stats_with(&mut conn, user_id, stats).await
    }

    pub async fn add_item(&self, user_id: i64, item_id: &str, quantity: u32) -> Result<(), sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        add_item_with(&mut conn, user_id, item_id, quantity).await
    }

    /// Remove `quantity` copies, dropping the row when none are left
    pub async fn remove_item(&self, user_id: i64, item_id: &str, quantity: u32) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("UPDATE inventory SET quantity = quantity - ? WHERE user_id = ? AND item_id = ?")
            .bind(quantity as i64)
            .bind(user_id)
            .bind(item_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM inventory WHERE user_id = ? AND item_id = ? AND quantity <= 0")
            .bind(user_id)
            .bind(item_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await
    }

    pub async fn set_equipped(&self, user_id: i64, item_id: &str, equipped: bool) -> Result<(), sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        set_equipped_with(&mut conn, user_id, item_id, equipped).await
    }

    pub async fn start_quest(&self, user_id: i64, quest_id: &str) -> Result<(), sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        start_quest_with(&mut conn, user_id, quest_id).await
    }

    pub async fn complete_quest(&self, user_id: i64, quest_id: &str) -> Result<(), sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        complete_quest_with(&mut conn, user_id, quest_id).await
    }

    pub async fn add_kill(&self, user_id: i64, enemy_id: &str) -> Result<(), sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        add_kills_with(&mut conn, user_id, enemy_id, 1).await
    }

    pub async fn add_defeated_boss(&self, user_id: i64, boss_id: &str) -> Result<(), sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        add_defeated_boss_with(&mut conn, user_id, boss_id).await
    }

    pub async fn add_ability(&self, user_id: i64, ability: &str) -> Result<(), sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        add_ability_with(&mut conn, user_id, ability).await
    }

    pub async fn add_effect(&self, user_id: i64, effect: &Effect) -> Result<(), sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        add_effect_with(&mut conn, user_id, effect).await
    }

    pub async fn clear_effects(&self, user_id: i64) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM active_effects WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn update_story_progress(&self, user_id: i64, city: &str, scene_id: &str) -> Result<(), sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        update_story_progress_with(&mut conn, user_id, city, scene_id).await
    }

    pub async fn unlock_location(&self, user_id: i64, location_id: &str) -> Result<(), sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        unlock_location_with(&mut conn, user_id, location_id).await
    }
}

// =============================================================================
// Statements
// =============================================================================

async fn clear_collections(conn: &mut SqliteConnection, user_id: i64) -> Result<(), sqlx::Error> {
    for table in COLLECTION_TABLES {
        sqlx::query(&format!("DELETE FROM {} WHERE user_id = ?", table))
            .bind(user_id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

async fn update_core_with(conn: &mut SqliteConnection, record: &PlayerRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE players SET class_id = ?, level = ?, experience = ?, gold = ?, artifact_slots = ?,
                location = ?, current_city = ?, last_location = ?, fatigue = ?,
                last_fatigue_update = ?, camp_entry_time = ?
         WHERE user_id = ?",
    )
    .bind(&record.class_id)
    .bind(record.level as i64)
    .bind(record.experience as i64)
    .bind(record.gold as i64)
    .bind(record.artifact_slots as i64)
    .bind(&record.location)
    .bind(&record.current_city)
    .bind(&record.last_location)
    .bind(record.fatigue)
    .bind(record.last_fatigue_update)
    .bind(record.camp_entry_time)
    .bind(record.user_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn update_stats_with(conn: &mut SqliteConnection, user_id: i64, stats: StatBlock) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT OR REPLACE INTO player_stats (user_id, health, attack, defense) VALUES (?, ?, ?, ?)")
        .bind(user_id)
        .bind(stats.health)
        .bind(stats.attack)
        .bind(stats.defense)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

async fn add_item_with(conn: &mut SqliteConnection, user_id: i64, item_id: &str, quantity: u32) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO inventory (user_id, item_id, quantity) VALUES (?, ?, ?)
         ON CONFLICT (user_id, item_id) DO UPDATE SET quantity = quantity + excluded.quantity",
    )
    .bind(user_id)
    .bind(item_id)
    .bind(quantity as i64)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn set_equipped_with(conn: &mut SqliteConnection, user_id: i64, item_id: &str, equipped: bool) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE inventory SET equipped = ? WHERE user_id = ? AND item_id = ?")
        .bind(equipped)
        .bind(user_id)
        .bind(item_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

async fn start_quest_with(conn: &mut SqliteConnection, user_id: i64, quest_id: &str) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT OR IGNORE INTO active_quests (user_id, quest_id) VALUES (?, ?)")
        .bind(user_id)
        .bind(quest_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

async fn complete_quest_with(conn: &mut SqliteConnection, user_id: i64, quest_id: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM active_quests WHERE user_id = ? AND quest_id = ?")
        .bind(user_id)
        .bind(quest_id)
        .execute(&mut *conn)
        .await?;
    sqlx::query("INSERT OR IGNORE INTO completed_quests (user_id, quest_id) VALUES (?, ?)")
        .bind(user_id)
        .bind(quest_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

async fn add_kills_with(conn: &mut SqliteConnection, user_id: i64, enemy_id: &str, count: u32) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO kill_counts (user_id, enemy_id, count) VALUES (?, ?, ?)
         ON CONFLICT (user_id, enemy_id) DO UPDATE SET count = count + excluded.count",
    )
    .bind(user_id)
    .bind(enemy_id)
    .bind(count as i64)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn add_defeated_boss_with(conn: &mut SqliteConnection, user_id: i64, boss_id: &str) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT OR IGNORE INTO defeated_bosses (user_id, boss_id) VALUES (?, ?)")
        .bind(user_id)
        .bind(boss_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

async fn add_ability_with(conn: &mut SqliteConnection, user_id: i64, ability: &str) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT OR IGNORE INTO player_abilities (user_id, ability) VALUES (?, ?)")
        .bind(user_id)
        .bind(ability)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

async fn add_effect_with(conn: &mut SqliteConnection, user_id: i64, effect: &Effect) -> Result<(), sqlx::Error> {
    let data = serde_json::to_string(effect).map_err(|e| sqlx::Error::Encode(Box::new(e)))?;
    sqlx::query("INSERT INTO active_effects (user_id, effect_data) VALUES (?, ?)")
        .bind(user_id)
        .bind(data)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

async fn update_story_progress_with(conn: &mut SqliteConnection, user_id: i64, city: &str, scene_id: &str) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT OR REPLACE INTO story_progress (user_id, city, scene_id) VALUES (?, ?, ?)")
        .bind(user_id)
        .bind(city)
        .bind(scene_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

async fn unlock_location_with(conn: &mut SqliteConnection, user_id: i64, location_id: &str) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT OR IGNORE INTO unlocked_locations (user_id, location_id) VALUES (?, ?)")
        .bind(user_id)
        .bind(location_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}
