//! Ability definitions.

use serde::{Deserialize, Serialize};
use crate::DamageType;

/// Per-battle use limit when an ability does not declare one
pub const DEFAULT_MAX_USES: u32 = 99;

// =============================================================================
// Ability Effects
// =============================================================================

/// One damage component of an ability. Each layer is resolved separately
/// against the target's resistance for its type.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DamageLayer {
    #[serde(rename = "mult")]
    pub multiplier: f64,
    #[serde(rename = "type", default)]
    pub damage_type: DamageType,
}

/// Damage over time attached to the enemy when the ability lands
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DotDef {
    pub name: String,
    #[serde(rename = "type", default)]
    pub damage_type: DamageType,
    #[serde(rename = "mult")]
    pub multiplier: f64,
    /// Number of enemy turns the DoT ticks for
    pub duration: u32,
}

// =============================================================================
// Ability Definition
// =============================================================================

/// Ability definition, keyed by its display name in the ability table
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AbilityDef {
    #[serde(default)]
    pub description: String,
    /// Uses allowed per battle
    #[serde(default = "default_max_uses")]
    pub max_uses: u32,
    #[serde(default)]
    pub layers: Vec<DamageLayer>,
    /// Older single-multiplier form, always physical
    #[serde(rename = "dmg_mult", default)]
    pub legacy_multiplier: Option<f64>,
    #[serde(default)]
    pub dot: Option<DotDef>,
    /// Heal as a fraction of the damage dealt
    #[serde(rename = "heal", default)]
    pub heal_fraction: Option<f64>,
    #[serde(default)]
    pub heal_flat: Option<i64>,
    /// One-turn defense bonus for the caster
    #[serde(default)]
    pub defense_buff: Option<i64>,
}

fn default_max_uses() -> u32 {
    DEFAULT_MAX_USES
}

impl Default for AbilityDef {
    fn default() -> Self {
        Self {
            description: String::new(),
            max_uses: DEFAULT_MAX_USES,
            layers: Vec::new(),
            legacy_multiplier: None,
            dot: None,
            heal_fraction: None,
            heal_flat: None,
            defense_buff: None,
        }
    }
}

impl AbilityDef {
    /// Damage layers to resolve. Declared layers win over the legacy multiplier.
    pub fn damage_layers(&self) -> Vec<DamageLayer> {
        if !self.layers.is_empty() {
            return self.layers.clone();
        }
        match self.legacy_multiplier {
            Some(multiplier) => vec![DamageLayer { multiplier, damage_type: DamageType::Physical }],
            None => Vec::new(),
        }
    }

    /// Whether the ability does anything at all when cast
    pub fn has_effect(&self) -> bool {
        !self.damage_layers().is_empty()
            || self.dot.is_some()
            || self.heal_fraction.is_some()
            || self.heal_flat.is_some()
            || self.defense_buff.is_some()
    }

    /// All multipliers declared by the ability (layers, legacy, DoT, heal)
    pub fn multipliers(&self) -> impl Iterator<Item = f64> + '_ {
        self.layers
            .iter()
            .map(|l| l.multiplier)
            .chain(self.legacy_multiplier)
            .chain(self.dot.as_ref().map(|d| d.multiplier))
            .chain(self.heal_fraction)
    }
}
