//! Locations, quests, story scenes and random events.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Where new players land after choosing a class, and the fallback location
pub const START_LOCATION: &str = "village_square";

/// Safe location players are sent to after a defeat
pub const CAMP_LOCATION: &str = "player_camp";

/// Location value of a player who has not chosen a class yet
pub const CLASS_SELECTION: &str = "class_selection";

/// Quest started right after class selection
pub const FIRST_QUEST: &str = "first_steps";

// =============================================================================
// Rewards
// =============================================================================

/// Rewards paid by quests, story scenes and events. Unknown keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RewardBundle {
    #[serde(default)]
    pub experience: Option<u64>,
    #[serde(default)]
    pub gold: Option<u64>,
    #[serde(default)]
    pub items: Vec<String>,
    #[serde(default)]
    pub crystals: Option<u64>,
}

impl RewardBundle {
    pub fn is_empty(&self) -> bool {
        self.experience.unwrap_or(0) == 0
            && self.gold.unwrap_or(0) == 0
            && self.items.is_empty()
            && self.crystals.unwrap_or(0) == 0
    }
}

// =============================================================================
// Locations
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocationDef {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub is_city: bool,
    /// Hidden from action lists until unlocked (by a story scene)
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub actions: Vec<LocationAction>,
}

/// A button offered at a location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationAction {
    pub text: String,
    #[serde(flatten)]
    pub kind: ActionKind,
    #[serde(default)]
    pub required_level: u32,
    #[serde(default)]
    pub required_quest: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionKind {
    Location { target: String },
    Battle { target: String },
    Quest { target: String },
    Story { target: String },
    Shop { shop_items: Vec<String> },
    RandomEvents { target: String },
}

// =============================================================================
// Quests
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuestDef {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Kills needed per enemy id
    #[serde(default)]
    pub objectives: BTreeMap<String, u32>,
    #[serde(default)]
    pub rewards: RewardBundle,
    #[serde(default)]
    pub requirements: QuestRequirements,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuestRequirements {
    #[serde(default)]
    pub level: Option<u32>,
    #[serde(default)]
    pub completed_quest: Option<String>,
}

// =============================================================================
// Story
// =============================================================================

/// One node of a city's linear storyline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoryScene {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub next_scene: Option<String>,
    #[serde(flatten)]
    pub kind: SceneKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SceneKind {
    Dialogue,
    Battle {
        enemy: String,
    },
    /// Ends the storyline at a location, optionally paying out and unlocking a city
    Location {
        target: String,
        #[serde(default)]
        rewards: Option<RewardBundle>,
        #[serde(default)]
        unlock_city: Option<String>,
    },
}

// =============================================================================
// Random Events
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomEvent {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub fatigue_cost: f64,
    #[serde(flatten)]
    pub kind: EventKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    Reward {
        #[serde(default)]
        rewards: RewardBundle,
    },
    Chain {
        scenes: Vec<ChainScene>,
    },
}

/// Step of a chained event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainScene {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(flatten)]
    pub kind: ChainSceneKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChainSceneKind {
    Dialogue,
    Battle {
        enemy: String,
    },
    Reward {
        #[serde(default)]
        rewards: RewardBundle,
    },
}
