//! Timed stat modifiers owned by a player.

use serde::{Deserialize, Serialize};
use rpg_shared::StatBlock;

/// A buff or debuff. Duration counts battles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Effect {
    pub name: String,
    pub stats: StatBlock,
    pub duration: u32,
}

/// Ordered list of active effects. Same-named effects coexist.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EffectLedger {
    effects: Vec<Effect>,
}

impl EffectLedger {
    pub fn from_effects(effects: Vec<Effect>) -> Self {
        Self { effects }
    }

    pub fn add(&mut self, name: impl Into<String>, stats: StatBlock, duration: u32) {
        self.effects.push(Effect {
            name: name.into(),
            stats,
            duration,
        });
    }

    /// Decrement every duration, drop the ones that ran out.
    /// Returns true when anything expired.
    pub fn tick(&mut self) -> bool {
        let before = self.effects.len();
        for effect in &mut self.effects {
            effect.duration = effect.duration.saturating_sub(1);
        }
        self.effects.retain(|effect| effect.duration > 0);
        self.effects.len() != before
    }

    /// Remove everything. Returns true when there was something to remove.
    pub fn clear(&mut self) -> bool {
        let had_any = !self.effects.is_empty();
        self.effects.clear();
        had_any
    }

    /// Sum of all stat deltas
    pub fn total(&self) -> StatBlock {
        self.effects
            .iter()
            .fold(StatBlock::default(), |acc, effect| acc + effect.stats)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Effect> {
        self.effects.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }
}
