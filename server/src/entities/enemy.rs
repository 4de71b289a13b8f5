//! Enemy state for a single battle.

use rpg_shared::{EnemyDef, PhaseOverride, Resistances};

/// Mutable copy of an enemy template. Phase changes rewrite this copy only.
#[derive(Debug, Clone, PartialEq)]
pub struct EnemySnapshot {
    pub id: String,
    pub name: String,
    pub image: Option<String>,
    pub max_health: i64,
    pub attack: i64,
    pub experience: u64,
    pub is_boss: bool,
    pub resistances: Resistances,
    phases: Vec<PhaseOverride>,
}

impl EnemySnapshot {
    pub fn from_def(id: &str, def: &EnemyDef) -> Self {
        Self {
            id: id.to_string(),
            name: def.name.clone(),
            image: def.image.clone(),
            max_health: def.health,
            attack: def.attack,
            experience: def.experience,
            is_boss: def.is_boss,
            resistances: def.resistances.clone(),
            phases: def.phases.clone(),
        }
    }

    /// Total number of phases including the first
    pub fn phase_count(&self) -> u32 {
        self.phases.len() as u32 + 1
    }

    /// Move from `current_phase` into the next one.
    /// Returns the override that was applied, or None when no phase is left.
    pub fn enter_next_phase(&mut self, current_phase: u32) -> Option<PhaseOverride> {
        let next = self.phases.get(current_phase.checked_sub(1)? as usize)?.clone();
        self.name = next.name.clone();
        self.attack = next.attack;
        self.max_health = next.health;
        if next.image.is_some() {
            self.image = next.image.clone();
        }
        if let Some(resistances) = &next.resistances {
            self.resistances = resistances.clone();
        }
        Some(next)
    }
}
