//! Reference data loading and validation.
//!
//! All tables are read once at startup from a directory of JSON files and
//! are immutable afterwards. Cross references are checked here so that a
//! typo in content fails the process at boot instead of mid-battle.

use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::{
    AbilityDef, ActionKind, ChainSceneKind, ClassDef, EnemyDef, EventKind, ItemDef, LocationDef,
    QuestDef, RandomEvent, Resistances, RewardBundle, SceneKind, StoryScene, CAMP_LOCATION,
    START_LOCATION,
};

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{owner} references unknown {kind} '{id}'")]
    UnknownReference {
        owner: String,
        kind: &'static str,
        id: String,
    },
    #[error("{owner}: {reason}")]
    Invalid { owner: String, reason: String },
    #[error("required location '{0}' is missing")]
    MissingLocation(&'static str),
}

/// All static game content
#[derive(Debug, Clone, Default)]
pub struct Content {
    pub classes: BTreeMap<String, ClassDef>,
    pub items: BTreeMap<String, ItemDef>,
    pub enemies: BTreeMap<String, EnemyDef>,
    pub bosses: BTreeMap<String, EnemyDef>,
    pub locations: BTreeMap<String, LocationDef>,
    pub quests: BTreeMap<String, QuestDef>,
    pub abilities: BTreeMap<String, AbilityDef>,
    /// Storyline per city, in scene order
    pub stories: BTreeMap<String, Vec<StoryScene>>,
    /// Random event pool per city
    pub random_events: BTreeMap<String, Vec<RandomEvent>>,
}

fn read_table<T: DeserializeOwned>(dir: &Path, file: &str) -> Result<T, ContentError> {
    let path = dir.join(file);
    let raw = std::fs::read_to_string(&path).map_err(|source| ContentError::Io {
        path: path.clone(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| ContentError::Json { path, source })
}

fn require(exists: bool, owner: &str, kind: &'static str, id: &str) -> Result<(), ContentError> {
    if exists {
        Ok(())
    } else {
        Err(ContentError::UnknownReference {
            owner: owner.to_string(),
            kind,
            id: id.to_string(),
        })
    }
}

fn invalid(owner: &str, reason: impl Into<String>) -> ContentError {
    ContentError::Invalid {
        owner: owner.to_string(),
        reason: reason.into(),
    }
}

impl Content {
    /// Load and validate every table from `dir`
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Self, ContentError> {
        let dir = dir.as_ref();
        let mut bosses: BTreeMap<String, EnemyDef> = read_table(dir, "bosses.json")?;
        for boss in bosses.values_mut() {
            boss.is_boss = true;
        }

        let content = Content {
            classes: read_table(dir, "classes.json")?,
            items: read_table(dir, "items.json")?,
            enemies: read_table(dir, "enemies.json")?,
            bosses,
            locations: read_table(dir, "locations.json")?,
            quests: read_table(dir, "quests.json")?,
            abilities: read_table(dir, "abilities.json")?,
            stories: read_table(dir, "story.json")?,
            random_events: read_table(dir, "random_events.json")?,
        };
        content.validate()?;
        Ok(content)
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    /// Enemy or boss template by id
    pub fn enemy(&self, id: &str) -> Option<&EnemyDef> {
        self.enemies.get(id).or_else(|| self.bosses.get(id))
    }

    pub fn class_by_name(&self, name: &str) -> Option<(&String, &ClassDef)> {
        self.classes.iter().find(|(_, class)| class.name == name)
    }

    pub fn item_by_name(&self, name: &str) -> Option<(&String, &ItemDef)> {
        self.items.iter().find(|(_, item)| item.name == name)
    }

    /// Display name of an item, the id itself when unknown
    pub fn item_name<'a>(&'a self, id: &'a str) -> &'a str {
        self.items.get(id).map(|item| item.name.as_str()).unwrap_or(id)
    }

    pub fn storyline(&self, city: &str) -> Option<&[StoryScene]> {
        self.stories.get(city).map(Vec::as_slice)
    }

    pub fn scene(&self, city: &str, scene_id: &str) -> Option<&StoryScene> {
        self.storyline(city)?.iter().find(|scene| scene.id == scene_id)
    }

    // =========================================================================
    // Validation
    // =========================================================================

    pub fn validate(&self) -> Result<(), ContentError> {
        for required in [START_LOCATION, CAMP_LOCATION] {
            if !self.locations.contains_key(required) {
                return Err(ContentError::MissingLocation(required));
            }
        }

        for (id, ability) in &self.abilities {
            let owner = format!("ability '{}'", id);
            if !ability.has_effect() {
                return Err(invalid(&owner, "declares no damage, DoT, heal or buff"));
            }
            if ability.max_uses == 0 {
                return Err(invalid(&owner, "max_uses must be positive"));
            }
            if ability.multipliers().any(|m| !m.is_finite() || m < 0.0) {
                return Err(invalid(&owner, "multipliers must be finite and non-negative"));
            }
        }

        for (id, class) in &self.classes {
            let owner = format!("class '{}'", id);
            if class.base_stats.health <= 0 {
                return Err(invalid(&owner, "base health must be positive"));
            }
            for ability in class.starting_abilities.iter().chain(class.unlocks.values().flatten()) {
                require(self.abilities.contains_key(ability), &owner, "ability", ability)?;
            }
        }

        for (id, enemy) in self.enemies.iter().chain(self.bosses.iter()) {
            self.validate_enemy(id, enemy)?;
        }

        for (id, quest) in &self.quests {
            let owner = format!("quest '{}'", id);
            for enemy in quest.objectives.keys() {
                require(self.enemy(enemy).is_some(), &owner, "enemy", enemy)?;
            }
            if let Some(previous) = &quest.requirements.completed_quest {
                require(self.quests.contains_key(previous), &owner, "quest", previous)?;
            }
            self.validate_rewards(&owner, &quest.rewards)?;
        }

        for (id, location) in &self.locations {
            self.validate_location(id, location)?;
        }

        for (city, scenes) in &self.stories {
            self.validate_storyline(city, scenes)?;
        }

        for (city, events) in &self.random_events {
            self.validate_events(city, events)?;
        }

        Ok(())
    }

    fn validate_enemy(&self, id: &str, enemy: &EnemyDef) -> Result<(), ContentError> {
        let owner = format!("enemy '{}'", id);
        if enemy.health <= 0 {
            return Err(invalid(&owner, "health must be positive"));
        }
        check_resistances(&owner, &enemy.resistances)?;
        for (index, phase) in enemy.phases.iter().enumerate() {
            if phase.health <= 0 {
                return Err(invalid(&owner, format!("phase {} health must be positive", index + 2)));
            }
            if let Some(resistances) = &phase.resistances {
                check_resistances(&owner, resistances)?;
            }
        }
        Ok(())
    }

    fn validate_rewards(&self, owner: &str, rewards: &RewardBundle) -> Result<(), ContentError> {
        for item in &rewards.items {
            require(self.items.contains_key(item), owner, "item", item)?;
        }
        Ok(())
    }

    fn validate_location(&self, id: &str, location: &LocationDef) -> Result<(), ContentError> {
        let owner = format!("location '{}'", id);
        for action in &location.actions {
            match &action.kind {
                ActionKind::Location { target } | ActionKind::RandomEvents { target } => {
                    require(self.locations.contains_key(target), &owner, "location", target)?
                }
                ActionKind::Battle { target } => {
                    require(self.enemy(target).is_some(), &owner, "enemy", target)?
                }
                ActionKind::Quest { target } => {
                    require(self.quests.contains_key(target), &owner, "quest", target)?
                }
                ActionKind::Story { target } => {
                    require(self.stories.contains_key(target), &owner, "storyline", target)?
                }
                ActionKind::Shop { shop_items } => {
                    for item in shop_items {
                        require(self.items.contains_key(item), &owner, "item", item)?;
                    }
                }
            }
            if let Some(quest) = &action.required_quest {
                require(self.quests.contains_key(quest), &owner, "quest", quest)?;
            }
        }
        Ok(())
    }

    fn validate_storyline(&self, city: &str, scenes: &[StoryScene]) -> Result<(), ContentError> {
        let owner = format!("storyline '{}'", city);
        if scenes.is_empty() {
            return Err(invalid(&owner, "has no scenes"));
        }
        let ids: BTreeSet<&str> = scenes.iter().map(|scene| scene.id.as_str()).collect();
        if ids.len() != scenes.len() {
            return Err(invalid(&owner, "scene ids must be unique"));
        }

        for scene in scenes {
            let owner = format!("scene '{}' of {}", scene.id, owner);
            if let Some(next) = &scene.next_scene {
                require(ids.contains(next.as_str()), &owner, "scene", next)?;
            }
            match &scene.kind {
                SceneKind::Dialogue => {}
                SceneKind::Battle { enemy } => {
                    require(self.enemy(enemy).is_some(), &owner, "enemy", enemy)?
                }
                SceneKind::Location { target, rewards, unlock_city } => {
                    require(self.locations.contains_key(target), &owner, "location", target)?;
                    if let Some(city) = unlock_city {
                        require(self.locations.contains_key(city), &owner, "location", city)?;
                    }
                    if let Some(rewards) = rewards {
                        self.validate_rewards(&owner, rewards)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn validate_events(&self, city: &str, events: &[RandomEvent]) -> Result<(), ContentError> {
        let owner = format!("random events of '{}'", city);
        require(self.locations.contains_key(city), &owner, "location", city)?;

        for event in events {
            let owner = format!("event '{}' in {}", event.name, city);
            if !event.fatigue_cost.is_finite() || !(0.0..=100.0).contains(&event.fatigue_cost) {
                return Err(invalid(&owner, "fatigue cost must be within 0..=100"));
            }
            match &event.kind {
                EventKind::Reward { rewards } => self.validate_rewards(&owner, rewards)?,
                EventKind::Chain { scenes } => {
                    if scenes.is_empty() {
                        return Err(invalid(&owner, "chain has no scenes"));
                    }
                    for scene in scenes {
                        match &scene.kind {
                            ChainSceneKind::Dialogue => {}
                            ChainSceneKind::Battle { enemy } => {
                                require(self.enemy(enemy).is_some(), &owner, "enemy", enemy)?
                            }
                            ChainSceneKind::Reward { rewards } => self.validate_rewards(&owner, rewards)?,
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

fn check_resistances(owner: &str, resistances: &Resistances) -> Result<(), ContentError> {
    if resistances.values().all(|value| value.is_finite()) {
        Ok(())
    } else {
        Err(invalid(owner, "resistances must be finite"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_tables(dir: &Path, overrides: &[(&str, &str)]) {
        let defaults = [
            ("classes.json", r#"{"warrior": {"name": "Warrior", "base_stats": {"health": 120, "attack": 12, "defense": 6}, "starting_abilities": ["Power Strike"]}}"#),
            ("items.json", r#"{"health_potion": {"name": "Health Potion", "type": "consumable", "price": 20, "stats": {"health": 50}}}"#),
            ("enemies.json", r#"{"wolf": {"name": "Wolf", "health": 30, "attack": 8, "experience": 25}}"#),
            ("bosses.json", r#"{"troll_king": {"name": "Troll King", "health": 200, "attack": 20, "experience": 300,
                "phases": [{"name": "Enraged Troll King", "health": 150, "attack": 28}]}}"#),
            ("locations.json", r#"{"village_square": {"name": "Village Square", "is_city": true,
                "actions": [{"text": "Hunt", "type": "battle", "target": "wolf"}]},
                "player_camp": {"name": "Camp"}}"#),
            ("quests.json", r#"{"first_steps": {"name": "First Steps", "objectives": {"wolf": 1}, "rewards": {"gold": 10, "items": ["health_potion"]}}}"#),
            ("abilities.json", r#"{"Power Strike": {"dmg_mult": 1.5, "max_uses": 3}}"#),
            ("story.json", "{}"),
            ("random_events.json", "{}"),
        ];
        for (file, body) in defaults {
            let body = overrides
                .iter()
                .find(|(name, _)| *name == file)
                .map(|(_, body)| *body)
                .unwrap_or(body);
            fs::write(dir.join(file), body).unwrap();
        }
    }

    #[test]
    fn test_load_valid_tables() {
        let dir = tempfile::tempdir().unwrap();
        write_tables(dir.path(), &[]);

        let content = Content::load_dir(dir.path()).unwrap();
        assert!(content.enemy("wolf").is_some());
        let boss = content.enemy("troll_king").unwrap();
        assert!(boss.is_boss);
        assert_eq!(boss.phases.len(), 1);
        assert_eq!(content.item_by_name("Health Potion").map(|(id, _)| id.as_str()), Some("health_potion"));
    }

    #[test]
    fn test_unknown_class_ability_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_tables(
            dir.path(),
            &[("classes.json", r#"{"mage": {"name": "Mage", "base_stats": {"health": 80}, "starting_abilities": ["Fireball"]}}"#)],
        );

        let err = Content::load_dir(dir.path()).unwrap_err();
        assert!(matches!(err, ContentError::UnknownReference { kind: "ability", .. }), "{err}");
    }

    #[test]
    fn test_missing_camp_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_tables(dir.path(), &[("locations.json", r#"{"village_square": {"name": "Village Square"}}"#)]);

        let err = Content::load_dir(dir.path()).unwrap_err();
        assert!(matches!(err, ContentError::MissingLocation(CAMP_LOCATION)));
    }

    #[test]
    fn test_malformed_table_names_file() {
        let dir = tempfile::tempdir().unwrap();
        write_tables(dir.path(), &[("enemies.json", r#"{"wolf": {"name": "Wolf"}}"#)]);

        let err = Content::load_dir(dir.path()).unwrap_err();
        match err {
            ContentError::Json { path, .. } => assert!(path.ends_with("enemies.json")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_dangling_next_scene_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_tables(
            dir.path(),
            &[("story.json", r#"{"village_square": [{"id": "s1", "type": "dialogue", "text": "Hi", "next_scene": "s9"}]}"#)],
        );

        let err = Content::load_dir(dir.path()).unwrap_err();
        assert!(matches!(err, ContentError::UnknownReference { kind: "scene", .. }));
    }

    #[test]
    fn test_shipped_tables_are_valid() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../data");
        let content = Content::load_dir(&dir).unwrap();
        assert!(content.locations[START_LOCATION].is_city);
        assert!(content.quests.contains_key(crate::FIRST_QUEST));
    }

    #[test]
    fn test_missing_table_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write_tables(dir.path(), &[]);
        fs::remove_file(dir.path().join("quests.json")).unwrap();

        assert!(matches!(Content::load_dir(dir.path()), Err(ContentError::Io { .. })));
    }
}
