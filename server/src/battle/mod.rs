//! Turn-based battle resolution.
//!
//! A [`BattleSession`] lives for one encounter. Every player input resolves a
//! full turn in a fixed order: player action, death check, damage over time,
//! death check, enemy attack, defeat check. Rendering is left to the caller,
//! which receives the turn as a list of [`BattleEvent`]s and an outcome.

mod damage;

use std::collections::BTreeMap;
use log::debug;
use rand::Rng;
use rpg_shared::{AbilityDef, Content, DamageType, StatBlock};

use crate::entities::{EnemySnapshot, PlayerRecord};

pub use damage::{dot_damage, enemy_damage, resolve_damage};

/// Damage over time ticking on the enemy
#[derive(Debug, Clone, PartialEq)]
pub struct DotInstance {
    pub name: String,
    pub damage_type: DamageType,
    pub damage: i64,
    pub remaining: u32,
}

/// What the player chose this turn
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlayerAction<'a> {
    Attack,
    Ability(&'a str),
    /// Drink a consumable by item id
    Potion(&'a str),
    Flee,
}

/// Something that happened during a turn, in order
#[derive(Debug, Clone, PartialEq)]
pub enum BattleEvent {
    PlayerHit {
        damage: i64,
    },
    AbilityUsed {
        name: String,
        uses: u32,
        max_uses: u32,
        hits: Vec<(DamageType, i64)>,
    },
    DotApplied {
        name: String,
        damage_type: DamageType,
        damage: i64,
        duration: u32,
        refreshed: bool,
    },
    Healed {
        amount: i64,
    },
    DefenseBuff {
        amount: i64,
    },
    PotionUsed {
        item: String,
        healed: i64,
        buff: Option<(StatBlock, u32)>,
    },
    DotTick {
        name: String,
        damage_type: DamageType,
        damage: i64,
    },
    EnemyHit {
        name: String,
        damage: i64,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// Input refused, nothing changed
    Rejected(String),
    /// Waiting for the next input
    Continue,
    /// The enemy came back in a new phase
    PhaseTransition { phase: u32, message: String },
    Victory,
    Defeat,
    Fled { effects_expired: bool },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TurnReport {
    pub events: Vec<BattleEvent>,
    pub outcome: TurnOutcome,
}

impl TurnReport {
    fn rejected(message: impl Into<String>) -> Self {
        Self {
            events: Vec::new(),
            outcome: TurnOutcome::Rejected(message.into()),
        }
    }
}

/// State of one encounter
#[derive(Debug, Clone, PartialEq)]
pub struct BattleSession {
    pub enemy: EnemySnapshot,
    pub enemy_health: i64,
    pub player_health: i64,
    /// 1-based, only ever increases
    pub phase: u32,
    ability_uses: BTreeMap<String, u32>,
    pub dots: Vec<DotInstance>,
}

impl BattleSession {
    /// Start a fight against `enemy`. Returns None for an unknown enemy id.
    pub fn start(enemy_id: &str, player: &PlayerRecord, content: &Content) -> Option<Self> {
        let def = content.enemy(enemy_id)?;
        let enemy = EnemySnapshot::from_def(enemy_id, def);
        Some(Self {
            enemy_health: enemy.max_health,
            enemy,
            player_health: player.base_stats.health,
            phase: 1,
            ability_uses: BTreeMap::new(),
            dots: Vec::new(),
        })
    }

    pub fn uses_of(&self, ability: &str) -> u32 {
        self.ability_uses.get(ability).copied().unwrap_or(0)
    }

    /// Resolve one full turn
    pub fn resolve_turn(
        &mut self,
        action: PlayerAction<'_>,
        player: &mut PlayerRecord,
        content: &Content,
        rng: &mut impl Rng,
    ) -> TurnReport {
        let stats = player.total_stats(content);
        let mut events = Vec::new();

        match action {
            PlayerAction::Flee => {
                let effects_expired = player.effects.tick();
                player.base_stats.health = self.player_health;
                return TurnReport {
                    events,
                    outcome: TurnOutcome::Fled { effects_expired },
                };
            }
            PlayerAction::Potion(item_id) => {
                if let Err(message) = self.drink_potion(item_id, player, content, &mut events) {
                    return TurnReport::rejected(message);
                }
            }
            PlayerAction::Attack => {
                let damage = resolve_damage(stats.attack, 1.0, DamageType::Physical, &self.enemy.resistances, rng);
                self.enemy_health -= damage;
                events.push(BattleEvent::PlayerHit { damage });
            }
            PlayerAction::Ability(name) => {
                let Some(ability) = content.abilities.get(name) else {
                    return TurnReport::rejected("Unknown ability.");
                };
                if !player.all_abilities(content).contains(name) {
                    return TurnReport::rejected("You haven't learned this ability.");
                }
                let uses = self.uses_of(name);
                if uses >= ability.max_uses {
                    return TurnReport::rejected(format!(
                        "{} is exhausted for this battle ({}/{}).",
                        name, uses, ability.max_uses
                    ));
                }
                self.cast(name, ability, stats, player, content, rng, &mut events);
            }
        }

        if self.enemy_health <= 0 {
            return self.enemy_down(player, events);
        }

        self.tick_dots(&mut events);
        if self.enemy_health <= 0 {
            return self.enemy_down(player, events);
        }

        let damage = enemy_damage(self.enemy.attack, stats.defense, rng);
        self.player_health -= damage;
        events.push(BattleEvent::EnemyHit {
            name: self.enemy.name.clone(),
            damage,
        });
        debug!(
            "player {} vs {}: enemy {} hp, player {} hp",
            player.user_id, self.enemy.id, self.enemy_health, self.player_health
        );

        if self.player_health <= 0 {
            return TurnReport {
                events,
                outcome: TurnOutcome::Defeat,
            };
        }

        player.base_stats.health = self.player_health;
        TurnReport {
            events,
            outcome: TurnOutcome::Continue,
        }
    }

    fn drink_potion(
        &mut self,
        item_id: &str,
        player: &mut PlayerRecord,
        content: &Content,
        events: &mut Vec<BattleEvent>,
    ) -> Result<(), String> {
        let item = match content.items.get(item_id) {
            Some(item) if item.is_consumable() && player.item_count(item_id) > 0 => item,
            _ => return Err("Potion not found.".to_string()),
        };
        let heal = item.heal_amount();
        if heal == 0 && item.buffs.is_none() {
            return Err(format!("{} can't be used in battle.", item.name));
        }
        let max_health = player.max_health(content);
        if heal > 0 && item.buffs.is_none() && self.player_health >= max_health {
            return Err("Your health is already full!".to_string());
        }

        player.remove_item(item_id);
        let before = self.player_health;
        if heal > 0 {
            self.player_health = (self.player_health + heal).min(max_health).max(before);
            player.base_stats.health = self.player_health;
        }
        let buff = item.buffs.as_ref().map(|buff| {
            player.effects.add(item.name.clone(), buff.stats, buff.duration);
            (buff.stats, buff.duration)
        });
        events.push(BattleEvent::PotionUsed {
            item: item.name.clone(),
            healed: self.player_health - before,
            buff,
        });
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn cast(
        &mut self,
        name: &str,
        ability: &AbilityDef,
        stats: StatBlock,
        player: &mut PlayerRecord,
        content: &Content,
        rng: &mut impl Rng,
        events: &mut Vec<BattleEvent>,
    ) {
        let uses = self.uses_of(name) + 1;
        self.ability_uses.insert(name.to_string(), uses);

        let hits: Vec<(DamageType, i64)> = ability
            .damage_layers()
            .iter()
            .map(|layer| {
                let damage = resolve_damage(stats.attack, layer.multiplier, layer.damage_type, &self.enemy.resistances, rng);
                (layer.damage_type, damage)
            })
            .collect();
        let total: i64 = hits.iter().map(|(_, damage)| damage).sum();
        self.enemy_health -= total;
        events.push(BattleEvent::AbilityUsed {
            name: name.to_string(),
            uses,
            max_uses: ability.max_uses,
            hits,
        });

        if let Some(dot) = &ability.dot {
            let damage = dot_damage(stats.attack, dot.multiplier, dot.damage_type, &self.enemy.resistances);
            let refreshed = match self.dots.iter_mut().find(|active| active.name == dot.name) {
                Some(active) => {
                    active.remaining = dot.duration;
                    active.damage = damage;
                    true
                }
                None => {
                    self.dots.push(DotInstance {
                        name: dot.name.clone(),
                        damage_type: dot.damage_type,
                        damage,
                        remaining: dot.duration,
                    });
                    false
                }
            };
            events.push(BattleEvent::DotApplied {
                name: dot.name.clone(),
                damage_type: dot.damage_type,
                damage,
                duration: dot.duration,
                refreshed,
            });
        }

        let heal = ability.heal_fraction.map_or(0, |fraction| (total as f64 * fraction).floor() as i64)
            + ability.heal_flat.unwrap_or(0);
        if heal > 0 {
            let before = self.player_health;
            self.player_health = (self.player_health + heal).min(player.max_health(content)).max(before);
            events.push(BattleEvent::Healed {
                amount: self.player_health - before,
            });
        }

        if let Some(amount) = ability.defense_buff {
            player.effects.add(name, StatBlock::new(0, 0, amount), 1);
            events.push(BattleEvent::DefenseBuff { amount });
        }
    }

    fn tick_dots(&mut self, events: &mut Vec<BattleEvent>) {
        for dot in &mut self.dots {
            self.enemy_health -= dot.damage;
            dot.remaining = dot.remaining.saturating_sub(1);
            events.push(BattleEvent::DotTick {
                name: dot.name.clone(),
                damage_type: dot.damage_type,
                damage: dot.damage,
            });
        }
        self.dots.retain(|dot| dot.remaining > 0);
    }

    /// Enemy health reached zero: next phase if there is one, otherwise victory
    fn enemy_down(&mut self, player: &mut PlayerRecord, events: Vec<BattleEvent>) -> TurnReport {
        player.base_stats.health = self.player_health;
        self.enemy_health = 0;

        let outcome = match self.enemy.enter_next_phase(self.phase) {
            Some(next) => {
                self.phase += 1;
                self.enemy_health = next.health;
                let message = next
                    .message
                    .unwrap_or_else(|| format!("{} grows stronger!", next.name));
                TurnOutcome::PhaseTransition {
                    phase: self.phase,
                    message,
                }
            }
            None => TurnOutcome::Victory,
        };
        TurnReport { events, outcome }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn test_attack_damage_band_and_enemy_reply() {
        let content = testing::content();
        let mut rng = rng();
        for _ in 0..50 {
            let mut player = testing::warrior(&content);
            let mut battle = BattleSession::start("training_dummy", &player, &content).unwrap();
            let report = battle.resolve_turn(PlayerAction::Attack, &mut player, &content, &mut rng);

            let BattleEvent::PlayerHit { damage } = report.events[0] else {
                panic!("expected a player hit first");
            };
            assert!((8..=12).contains(&damage));
            assert_eq!(battle.enemy_health, 30 - damage);
            assert_eq!(report.events[1], BattleEvent::EnemyHit { name: "Training Dummy".into(), damage: 1 });
            assert_eq!(report.outcome, TurnOutcome::Continue);
            assert_eq!(player.base_stats.health, 119);
        }
    }

    #[test]
    fn test_kill_skips_enemy_turn() {
        let content = testing::content();
        let mut player = testing::warrior(&content);
        let mut battle = BattleSession::start("training_dummy", &player, &content).unwrap();
        battle.enemy_health = 1;

        let report = battle.resolve_turn(PlayerAction::Attack, &mut player, &content, &mut rng());
        assert_eq!(report.outcome, TurnOutcome::Victory);
        assert!(!report.events.iter().any(|e| matches!(e, BattleEvent::EnemyHit { .. })));
        assert_eq!(battle.enemy_health, 0);
    }

    #[test]
    fn test_boss_phase_transition_before_victory() {
        let content = testing::content();
        let mut player = testing::warrior(&content);
        let mut battle = BattleSession::start("troll_king", &player, &content).unwrap();
        let mut rng = rng();

        let report = battle.resolve_turn(PlayerAction::Attack, &mut player, &content, &mut rng);
        assert_eq!(
            report.outcome,
            TurnOutcome::PhaseTransition { phase: 2, message: "The Troll King roars!".into() }
        );
        assert_eq!(battle.enemy_health, 60);
        assert_eq!(battle.enemy.name, "Enraged Troll King");
        assert_eq!(battle.enemy.attack, 6);
        assert_eq!(content.bosses["troll_king"].name, "Troll King");

        let report = battle.resolve_turn(PlayerAction::Attack, &mut player, &content, &mut rng);
        assert_eq!(report.outcome, TurnOutcome::Continue);

        battle.enemy_health = 1;
        let report = battle.resolve_turn(PlayerAction::Attack, &mut player, &content, &mut rng);
        assert_eq!(report.outcome, TurnOutcome::Victory);
        assert_eq!(battle.phase, 2);
    }

    #[test]
    fn test_ability_use_limit() {
        let content = testing::content();
        let mut player = testing::warrior(&content);
        let mut battle = BattleSession::start("ogre", &player, &content).unwrap();
        battle.enemy.attack = 0;
        let mut rng = rng();

        let first = battle.resolve_turn(PlayerAction::Ability("Shield Wall"), &mut player, &content, &mut rng);
        assert!(first.events.contains(&BattleEvent::DefenseBuff { amount: 5 }));
        assert_eq!(player.effects.len(), 1);
        assert_eq!(battle.uses_of("Shield Wall"), 1);

        let health = battle.enemy_health;
        let second = battle.resolve_turn(PlayerAction::Ability("Shield Wall"), &mut player, &content, &mut rng);
        assert!(matches!(second.outcome, TurnOutcome::Rejected(_)));
        assert!(second.events.is_empty());
        assert_eq!(battle.enemy_health, health);
        assert_eq!(battle.uses_of("Shield Wall"), 1);
    }

    #[test]
    fn test_unlearned_ability_is_rejected() {
        let content = testing::content();
        let mut player = testing::warrior(&content);
        let mut battle = BattleSession::start("wolf", &player, &content).unwrap();

        let report = battle.resolve_turn(PlayerAction::Ability("Whirlwind"), &mut player, &content, &mut rng());
        assert!(matches!(report.outcome, TurnOutcome::Rejected(_)));

        player.level = 3;
        let report = battle.resolve_turn(PlayerAction::Ability("Whirlwind"), &mut player, &content, &mut rng());
        assert!(matches!(report.events[0], BattleEvent::AbilityUsed { .. }));
    }

    #[test]
    fn test_dot_refreshes_instead_of_stacking() {
        let content = testing::content();
        let mut player = testing::warrior(&content);
        let mut battle = BattleSession::start("wolf", &player, &content).unwrap();
        battle.enemy_health = 1000;
        let mut rng = rng();

        battle.resolve_turn(PlayerAction::Ability("Venom Blade"), &mut player, &content, &mut rng);
        // applied at 3, ticked once
        assert_eq!(battle.dots.len(), 1);
        assert_eq!(battle.dots[0].remaining, 2);
        // 10 attack * 0.5 mult * (1 - 0.5 poison resistance)
        assert_eq!(battle.dots[0].damage, 2);

        let report = battle.resolve_turn(PlayerAction::Ability("Venom Blade"), &mut player, &content, &mut rng);
        assert_eq!(battle.dots.len(), 1);
        assert_eq!(battle.dots[0].remaining, 2);
        assert!(report.events.iter().any(|e| matches!(e, BattleEvent::DotApplied { refreshed: true, .. })));
    }

    #[test]
    fn test_dot_can_finish_enemy_before_it_strikes() {
        let content = testing::content();
        let mut player = testing::warrior(&content);
        let mut battle = BattleSession::start("ogre", &player, &content).unwrap();
        battle.enemy_health = 2;

        let report = battle.resolve_turn(PlayerAction::Ability("Venom Blade"), &mut player, &content, &mut rng());
        assert_eq!(report.outcome, TurnOutcome::Victory);
        assert!(report.events.iter().any(|e| matches!(e, BattleEvent::DotTick { .. })));
        assert!(!report.events.iter().any(|e| matches!(e, BattleEvent::EnemyHit { .. })));
    }

    #[test]
    fn test_drain_heal_is_clamped_to_max_health() {
        let content = testing::content();
        let mut player = testing::warrior(&content);
        player.base_stats.health = 119;
        let mut battle = BattleSession::start("training_dummy", &player, &content).unwrap();
        battle.enemy_health = 1000;

        let report = battle.resolve_turn(PlayerAction::Ability("Drain"), &mut player, &content, &mut rng());
        assert!(report.events.contains(&BattleEvent::Healed { amount: 1 }));
        // healed to 120, then the dummy hits for 1
        assert_eq!(player.base_stats.health, 119);
    }

    #[test]
    fn test_fraction_and_flat_heals_add_up() {
        let mut content = testing::content();
        let ability: AbilityDef =
            serde_json::from_str(r#"{"layers": [{"mult": 1.0, "type": "dark"}], "heal": 0.5, "heal_flat": 20}"#).unwrap();
        content.abilities.insert("Siphon".into(), ability);
        let mut player = testing::warrior(&content);
        player.abilities.insert("Siphon".into());
        player.base_stats.health = 50;
        let mut battle = BattleSession::start("training_dummy", &player, &content).unwrap();
        battle.enemy_health = 1000;

        let report = battle.resolve_turn(PlayerAction::Ability("Siphon"), &mut player, &content, &mut rng());
        let Some(BattleEvent::AbilityUsed { hits, .. }) = report.events.first() else {
            panic!("expected the ability first");
        };
        let total: i64 = hits.iter().map(|(_, damage)| damage).sum();
        assert!(report.events.contains(&BattleEvent::Healed { amount: total / 2 + 20 }));
    }

    #[test]
    fn test_potion_rejected_at_full_health() {
        let content = testing::content();
        let mut player = testing::warrior(&content);
        player.add_item("health_potion");
        let mut battle = BattleSession::start("wolf", &player, &content).unwrap();

        let report = battle.resolve_turn(PlayerAction::Potion("health_potion"), &mut player, &content, &mut rng());
        assert_eq!(report.outcome, TurnOutcome::Rejected("Your health is already full!".into()));
        assert_eq!(player.item_count("health_potion"), 1);
        assert_eq!(battle.enemy_health, 20);
    }

    #[test]
    fn test_potion_heals_and_consumes_the_turn() {
        let content = testing::content();
        let mut player = testing::warrior(&content);
        player.base_stats.health = 40;
        player.add_item("health_potion");
        player.add_item("rage_draught");
        let mut battle = BattleSession::start("training_dummy", &player, &content).unwrap();
        let mut rng = rng();

        let report = battle.resolve_turn(PlayerAction::Potion("health_potion"), &mut player, &content, &mut rng);
        assert_eq!(report.events[0], BattleEvent::PotionUsed { item: "Health Potion".into(), healed: 50, buff: None });
        assert_eq!(battle.enemy_health, 30);
        assert_eq!(player.base_stats.health, 89);
        assert_eq!(player.item_count("health_potion"), 0);

        let report = battle.resolve_turn(PlayerAction::Potion("rage_draught"), &mut player, &content, &mut rng);
        assert!(matches!(report.events[0], BattleEvent::PotionUsed { buff: Some(_), .. }));
        assert_eq!(player.total_stats(&content).attack, 15);
    }

    #[test]
    fn test_flee_ticks_effects_without_retaliation() {
        let content = testing::content();
        let mut player = testing::warrior(&content);
        player.effects.add("Rage Draught", StatBlock::new(0, 5, 0), 1);
        let mut battle = BattleSession::start("ogre", &player, &content).unwrap();

        let report = battle.resolve_turn(PlayerAction::Flee, &mut player, &content, &mut rng());
        assert_eq!(report.outcome, TurnOutcome::Fled { effects_expired: true });
        assert!(report.events.is_empty());
        assert_eq!(player.base_stats.health, 120);
    }

    #[test]
    fn test_defeat_when_health_drops_to_zero() {
        let content = testing::content();
        let mut player = testing::warrior(&content);
        let mut battle = BattleSession::start("ogre", &player, &content).unwrap();

        let report = battle.resolve_turn(PlayerAction::Attack, &mut player, &content, &mut rng());
        assert_eq!(report.outcome, TurnOutcome::Defeat);
        assert!(battle.player_health <= 0);
    }
}
