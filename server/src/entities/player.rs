//! Server-side player record.

use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;
use rpg_shared::{ClassDef, Content, StatBlock, CAMP_LOCATION, CLASS_SELECTION, START_LOCATION};

use super::effects::EffectLedger;

/// Gold a new player starts with
pub const STARTING_GOLD: u64 = 50;

/// Artifact slots a new player starts with
pub const STARTING_ARTIFACT_SLOTS: u32 = 1;

/// Max health gained per level
pub const HEALTH_PER_LEVEL: i64 = 10;

/// Max health of a player that has not chosen a class
const CLASSLESS_MAX_HEALTH: i64 = 100;

/// Fatigue cap, also the starting value
pub const MAX_FATIGUE: f64 = 100.0;

/// Seconds to regenerate from zero to full fatigue
const FATIGUE_FULL_REGEN_SECS: f64 = 3600.0;

/// Current wall clock as unix seconds
pub fn now_secs() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}

/// Why an artifact could not be equipped or unequipped
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EquipError {
    #[error("You don't have this item.")]
    NotInInventory,
    #[error("This artifact is already equipped.")]
    AlreadyEquipped,
    #[error("This item can't be equipped.")]
    NotAnArtifact,
    #[error("No free artifact slots ({used}/{slots}).")]
    NoFreeSlots { used: usize, slots: u32 },
    #[error("This artifact isn't equipped.")]
    NotEquipped,
}

/// Everything a player owns and has achieved
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerRecord {
    pub user_id: i64,
    pub class_id: Option<String>,
    /// Health here is the current health, attack and defense are permanent
    pub base_stats: StatBlock,
    /// Learned abilities (starting ones plus level unlocks)
    pub abilities: BTreeSet<String>,
    /// Item id to count
    pub inventory: BTreeMap<String, u32>,
    pub equipped_artifacts: BTreeSet<String>,
    pub artifact_slots: u32,
    pub gold: u64,
    pub effects: EffectLedger,
    pub active_quests: BTreeSet<String>,
    pub completed_quests: BTreeSet<String>,
    pub location: String,
    pub current_city: String,
    pub last_location: String,
    pub level: u32,
    pub experience: u64,
    pub kill_counts: BTreeMap<String, u32>,
    pub visited_locations: BTreeSet<String>,
    pub unlocked_locations: BTreeSet<String>,
    pub defeated_bosses: BTreeSet<String>,
    pub fatigue: f64,
    pub last_fatigue_update: f64,
    /// Set while recovering at the camp after a defeat
    pub camp_entry_time: Option<f64>,
    /// City to the furthest scene id reached
    pub story_progress: BTreeMap<String, String>,
}

impl PlayerRecord {
    /// Fresh record for a first contact
    pub fn new(user_id: i64, now: f64) -> Self {
        let start: BTreeSet<String> = [START_LOCATION.to_string()].into_iter().collect();
        Self {
            user_id,
            class_id: None,
            base_stats: StatBlock::new(100, 10, 5),
            abilities: BTreeSet::new(),
            inventory: BTreeMap::new(),
            equipped_artifacts: BTreeSet::new(),
            artifact_slots: STARTING_ARTIFACT_SLOTS,
            gold: STARTING_GOLD,
            effects: EffectLedger::default(),
            active_quests: BTreeSet::new(),
            completed_quests: BTreeSet::new(),
            location: CLASS_SELECTION.to_string(),
            current_city: START_LOCATION.to_string(),
            last_location: START_LOCATION.to_string(),
            level: 1,
            experience: 0,
            kill_counts: BTreeMap::new(),
            visited_locations: start.clone(),
            unlocked_locations: start,
            defeated_bosses: BTreeSet::new(),
            fatigue: MAX_FATIGUE,
            last_fatigue_update: now,
            camp_entry_time: None,
            story_progress: BTreeMap::new(),
        }
    }

    /// Adopt a class: its base stats and starting abilities
    pub fn choose_class(&mut self, class_id: &str, class: &ClassDef) {
        self.class_id = Some(class_id.to_string());
        self.base_stats = class.base_stats;
        self.abilities.extend(class.starting_abilities.iter().cloned());
    }

    pub fn class<'a>(&self, content: &'a Content) -> Option<&'a ClassDef> {
        self.class_id.as_ref().and_then(|id| content.classes.get(id))
    }

    pub fn is_resting(&self) -> bool {
        self.location == CAMP_LOCATION
    }

    // =========================================================================
    // Stats
    // =========================================================================

    /// Class base health plus the per-level bonus
    pub fn max_health(&self, content: &Content) -> i64 {
        match self.class(content) {
            Some(class) => class.base_stats.health + (self.level as i64 - 1) * HEALTH_PER_LEVEL,
            None => CLASSLESS_MAX_HEALTH,
        }
    }

    /// Base stats plus equipped artifacts plus active effects
    pub fn total_stats(&self, content: &Content) -> StatBlock {
        let artifacts = self
            .equipped_artifacts
            .iter()
            .filter_map(|id| content.items.get(id))
            .fold(StatBlock::default(), |acc, item| acc + item.stats);
        self.base_stats + artifacts + self.effects.total()
    }

    /// Learned abilities plus anything the class grants at or below the current level
    pub fn all_abilities(&self, content: &Content) -> BTreeSet<String> {
        let mut abilities = self.abilities.clone();
        if let Some(class) = self.class(content) {
            abilities.extend(class.unlocked_up_to(self.level).cloned());
        }
        abilities
    }

    // =========================================================================
    // Inventory
    // =========================================================================

    pub fn add_item(&mut self, item_id: &str) {
        *self.inventory.entry(item_id.to_string()).or_insert(0) += 1;
    }

    /// Remove one copy. The last copy of an equipped artifact is unequipped too.
    pub fn remove_item(&mut self, item_id: &str) -> bool {
        let Some(count) = self.inventory.get_mut(item_id) else {
            return false;
        };
        *count -= 1;
        if *count == 0 {
            self.inventory.remove(item_id);
            self.equipped_artifacts.remove(item_id);
        }
        true
    }

    pub fn item_count(&self, item_id: &str) -> u32 {
        self.inventory.get(item_id).copied().unwrap_or(0)
    }

    pub fn equip_artifact(&mut self, item_id: &str, content: &Content) -> Result<(), EquipError> {
        if self.item_count(item_id) == 0 {
            return Err(EquipError::NotInInventory);
        }
        if self.equipped_artifacts.contains(item_id) {
            return Err(EquipError::AlreadyEquipped);
        }
        if !content.items.get(item_id).is_some_and(|item| item.is_artifact()) {
            return Err(EquipError::NotAnArtifact);
        }
        if self.equipped_artifacts.len() >= self.artifact_slots as usize {
            return Err(EquipError::NoFreeSlots {
                used: self.equipped_artifacts.len(),
                slots: self.artifact_slots,
            });
        }
        self.equipped_artifacts.insert(item_id.to_string());
        Ok(())
    }

    pub fn unequip_artifact(&mut self, item_id: &str) -> Result<(), EquipError> {
        if self.equipped_artifacts.remove(item_id) {
            Ok(())
        } else {
            Err(EquipError::NotEquipped)
        }
    }

    // =========================================================================
    // World progress
    // =========================================================================

    pub fn unlock_location(&mut self, location_id: &str) {
        self.unlocked_locations.insert(location_id.to_string());
    }

    pub fn record_kill(&mut self, enemy_id: &str) {
        *self.kill_counts.entry(enemy_id.to_string()).or_insert(0) += 1;
    }

    pub fn kills(&self, enemy_id: &str) -> u32 {
        self.kill_counts.get(enemy_id).copied().unwrap_or(0)
    }

    /// True once the city's progress points at its last scene
    pub fn has_completed_story(&self, city: &str, content: &Content) -> bool {
        match (content.storyline(city).and_then(|scenes| scenes.last()), self.story_progress.get(city)) {
            (Some(last), Some(reached)) => last.id == *reached,
            _ => false,
        }
    }

    // =========================================================================
    // Fatigue
    // =========================================================================

    /// Regenerate fatigue for the time elapsed since the last update
    pub fn update_fatigue(&mut self, now: f64) {
        let elapsed = now - self.last_fatigue_update;
        if elapsed <= 0.0 {
            return;
        }
        let gained = elapsed * MAX_FATIGUE / FATIGUE_FULL_REGEN_SECS;
        self.fatigue = (self.fatigue + gained).min(MAX_FATIGUE);
        self.last_fatigue_update = now;
    }

    pub fn spend_fatigue(&mut self, amount: f64, now: f64) {
        self.update_fatigue(now);
        self.fatigue = (self.fatigue - amount).clamp(0.0, MAX_FATIGUE);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rpg_shared::{ItemDef, ItemType, StoryScene, SceneKind};

    fn content() -> Content {
        let mut content = Content::default();
        content.classes.insert(
            "warrior".into(),
            ClassDef {
                name: "Warrior".into(),
                base_stats: StatBlock::new(120, 12, 6),
                starting_abilities: vec!["Power Strike".into()],
                unlocks: [(3, vec!["Shield Wall".into()])].into_iter().collect(),
                ..Default::default()
            },
        );
        for (id, item_type, stats) in [
            ("iron_amulet", ItemType::Artifact, StatBlock::new(0, 0, 3)),
            ("wolf_fang", ItemType::Artifact, StatBlock::new(0, 4, 0)),
            ("health_potion", ItemType::Consumable, StatBlock::new(50, 0, 0)),
        ] {
            content.items.insert(
                id.into(),
                ItemDef { name: id.into(), item_type, stats, ..Default::default() },
            );
        }
        content
    }

    fn warrior() -> PlayerRecord {
        let content = content();
        let mut player = PlayerRecord::new(7, 0.0);
        player.choose_class("warrior", &content.classes["warrior"]);
        player
    }

    #[test]
    fn test_new_player_defaults() {
        let player = PlayerRecord::new(1, 10.0);
        assert_eq!(player.location, CLASS_SELECTION);
        assert_eq!(player.gold, STARTING_GOLD);
        assert_eq!(player.artifact_slots, 1);
        assert!(player.unlocked_locations.contains(START_LOCATION));
        assert_eq!(player.max_health(&content()), 100);
    }

    #[test]
    fn test_total_stats_fold_artifacts_and_effects() {
        let content = content();
        let mut player = warrior();
        player.add_item("iron_amulet");
        player.equip_artifact("iron_amulet", &content).unwrap();
        player.effects.add("Rage", StatBlock::new(0, 5, 0), 2);

        assert_eq!(player.total_stats(&content), StatBlock::new(120, 17, 9));
    }

    #[test]
    fn test_equip_beyond_slots_fails_without_change() {
        let content = content();
        let mut player = warrior();
        player.add_item("iron_amulet");
        player.add_item("wolf_fang");
        player.equip_artifact("iron_amulet", &content).unwrap();

        let before = player.equipped_artifacts.clone();
        assert_eq!(
            player.equip_artifact("wolf_fang", &content),
            Err(EquipError::NoFreeSlots { used: 1, slots: 1 })
        );
        assert_eq!(player.equipped_artifacts, before);
    }

    #[test]
    fn test_equip_error_order() {
        let content = content();
        let mut player = warrior();
        assert_eq!(player.equip_artifact("iron_amulet", &content), Err(EquipError::NotInInventory));

        player.add_item("health_potion");
        assert_eq!(player.equip_artifact("health_potion", &content), Err(EquipError::NotAnArtifact));

        player.add_item("iron_amulet");
        player.equip_artifact("iron_amulet", &content).unwrap();
        assert_eq!(player.equip_artifact("iron_amulet", &content), Err(EquipError::AlreadyEquipped));
        assert_eq!(player.unequip_artifact("wolf_fang"), Err(EquipError::NotEquipped));
        assert_eq!(player.unequip_artifact("iron_amulet"), Ok(()));
    }

    #[test]
    fn test_inventory_is_a_multiset() {
        let mut player = warrior();
        player.add_item("health_potion");
        player.add_item("health_potion");
        assert_eq!(player.item_count("health_potion"), 2);

        assert!(player.remove_item("health_potion"));
        assert!(player.remove_item("health_potion"));
        assert!(!player.remove_item("health_potion"));
        assert!(player.inventory.is_empty());
    }

    #[test]
    fn test_level_gated_abilities() {
        let content = content();
        let mut player = warrior();
        assert!(!player.all_abilities(&content).contains("Shield Wall"));
        player.level = 3;
        let abilities = player.all_abilities(&content);
        assert!(abilities.contains("Shield Wall"));
        assert!(abilities.contains("Power Strike"));
        assert_eq!(player.max_health(&content), 140);
    }

    #[test]
    fn test_fatigue_regenerates_and_caps() {
        let mut player = PlayerRecord::new(1, 0.0);
        player.spend_fatigue(60.0, 0.0);
        assert_eq!(player.fatigue, 40.0);

        player.update_fatigue(1800.0);
        assert!((player.fatigue - 90.0).abs() < 1e-9);

        player.update_fatigue(7200.0);
        assert_eq!(player.fatigue, MAX_FATIGUE);
    }

    #[test]
    fn test_story_completion_tracks_last_scene() {
        let mut content = content();
        let scene = |id: &str| StoryScene {
            id: id.into(),
            title: None,
            text: String::new(),
            image: None,
            next_scene: None,
            kind: SceneKind::Dialogue,
        };
        content.stories.insert("village_square".into(), vec![scene("a"), scene("b")]);

        let mut player = warrior();
        assert!(!player.has_completed_story("village_square", &content));
        player.story_progress.insert("village_square".into(), "a".into());
        assert!(!player.has_completed_story("village_square", &content));
        player.story_progress.insert("village_square".into(), "b".into());
        assert!(player.has_completed_story("village_square", &content));
    }
}
