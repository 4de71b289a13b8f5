//! Stat blocks, damage types and resistance maps.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::{Add, AddAssign};

// =============================================================================
// Damage Types
// =============================================================================

/// Elemental type of a damage instance
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DamageType {
    #[default]
    Physical,
    Fire,
    Ice,
    Poison,
    Magic,
    Lightning,
    Light,
    Earth,
    Dark,
}

impl DamageType {
    pub fn icon(&self) -> &'static str {
        match self {
            Self::Physical => "⚔️",
            Self::Fire => "🔥",
            Self::Ice => "❄️",
            Self::Poison => "☠️",
            Self::Magic => "✨",
            Self::Lightning => "⚡",
            Self::Light => "🌟",
            Self::Earth => "🌍",
            Self::Dark => "🌑",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Physical => "physical",
            Self::Fire => "fire",
            Self::Ice => "ice",
            Self::Poison => "poison",
            Self::Magic => "magic",
            Self::Lightning => "lightning",
            Self::Light => "light",
            Self::Earth => "earth",
            Self::Dark => "dark",
        }
    }
}

/// Resistance per damage type. Positive values reduce damage, negative values
/// are weaknesses and amplify it.
pub type Resistances = BTreeMap<DamageType, f64>;

/// Resistance against `damage_type`, zero when unlisted
pub fn resistance_to(resistances: &Resistances, damage_type: DamageType) -> f64 {
    resistances.get(&damage_type).copied().unwrap_or(0.0)
}

/// Render a resistance map as the damage modifier each entry causes,
/// e.g. `🔥 -25%` for a 0.25 fire resistance and `❄️ +50%` for an ice weakness.
pub fn describe_resistances(resistances: &Resistances) -> Vec<String> {
    resistances
        .iter()
        .filter(|(_, value)| **value != 0.0)
        .map(|(damage_type, value)| {
            let modifier = (-value * 100.0).round() as i64;
            format!("{} {:+}%", damage_type.icon(), modifier)
        })
        .collect()
}

// =============================================================================
// Stat Blocks
// =============================================================================

/// Health, attack and defense. Used for base stats, item bonuses and effect deltas.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatBlock {
    pub health: i64,
    pub attack: i64,
    pub defense: i64,
}

impl StatBlock {
    pub fn new(health: i64, attack: i64, defense: i64) -> Self {
        Self { health, attack, defense }
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }

    /// Non-zero entries as `ATTACK +5` fragments
    pub fn describe(&self) -> Vec<String> {
        [("HEALTH", self.health), ("ATTACK", self.attack), ("DEFENSE", self.defense)]
            .into_iter()
            .filter(|(_, value)| *value != 0)
            .map(|(label, value)| format!("{} {:+}", label, value))
            .collect()
    }
}

impl Add for StatBlock {
    type Output = StatBlock;

    fn add(self, other: StatBlock) -> StatBlock {
        StatBlock {
            health: self.health + other.health,
            attack: self.attack + other.attack,
            defense: self.defense + other.defense,
        }
    }
}

impl AddAssign for StatBlock {
    fn add_assign(&mut self, other: StatBlock) {
        *self = *self + other;
    }
}
