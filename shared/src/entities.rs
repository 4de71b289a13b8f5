//! Character classes and enemy templates.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use crate::{Resistances, StatBlock};

/// Playable class
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassDef {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image: Option<String>,
    pub base_stats: StatBlock,
    #[serde(default)]
    pub starting_abilities: Vec<String>,
    /// Abilities granted on reaching a level, keyed by that level
    #[serde(default)]
    pub unlocks: BTreeMap<u32, Vec<String>>,
}

impl ClassDef {
    /// Abilities unlocked at or below `level`
    pub fn unlocked_up_to(&self, level: u32) -> impl Iterator<Item = &String> {
        self.unlocks.range(..=level).flat_map(|(_, names)| names.iter())
    }
}

/// Enemy or boss template. Battles work on a copy, never on the template.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnemyDef {
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
    pub health: i64,
    pub attack: i64,
    #[serde(default)]
    pub experience: u64,
    #[serde(default)]
    pub is_boss: bool,
    #[serde(default)]
    pub resistances: Resistances,
    /// Further phases after the first health bar, in order
    #[serde(default)]
    pub phases: Vec<PhaseOverride>,
}

/// Replacement values applied to the enemy when it enters the next phase
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PhaseOverride {
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
    pub health: i64,
    pub attack: i64,
    /// Keeps the previous resistances when absent
    #[serde(default)]
    pub resistances: Option<Resistances>,
    #[serde(default)]
    pub message: Option<String>,
}
