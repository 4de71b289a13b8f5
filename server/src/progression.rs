//! Experience, rewards, quests and the aftermath of a battle.

use log::{debug, warn};
use thiserror::Error;
use rpg_shared::{Content, QuestDef, RewardBundle, CAMP_LOCATION, START_LOCATION};

use crate::entities::{EnemySnapshot, PlayerRecord};
use crate::entities::player::HEALTH_PER_LEVEL;

/// Experience needed per level is `level * EXPERIENCE_PER_LEVEL`
pub const EXPERIENCE_PER_LEVEL: u64 = 100;

/// Attack gained per level
pub const ATTACK_PER_LEVEL: i64 = 2;

/// Share of max health restored after a won battle
const VICTORY_REGEN_FRACTION: f64 = 0.3;

/// Gold paid per point of enemy experience
const BATTLE_GOLD_RATIO: f64 = 0.8;

/// Extra gold for defeating a boss
pub const BOSS_GOLD_BONUS: u64 = 100;

// =============================================================================
// Rewards
// =============================================================================

/// What a reward actually changed, for the chat summary
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RewardSummary {
    pub experience: u64,
    pub gold: u64,
    /// Display names of granted items
    pub items: Vec<String>,
    /// Level reached, if any level was gained
    pub new_level: Option<u32>,
    pub unlocked_abilities: Vec<String>,
}

impl RewardSummary {
    pub fn lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if self.experience > 0 {
            lines.push(format!("✨ +{} experience", self.experience));
        }
        if self.gold > 0 {
            lines.push(format!("💰 +{} gold", self.gold));
        }
        for item in &self.items {
            lines.push(format!("🎁 {}", item));
        }
        if let Some(level) = self.new_level {
            lines.push(format!("🎉 LEVEL UP! You are now level {}!", level));
        }
        for ability in &self.unlocked_abilities {
            lines.push(format!("🔮 New ability: {}", ability));
        }
        lines
    }
}

/// Apply a reward bundle and report what changed.
/// Unknown items are skipped and crystals are not tracked on the record.
pub fn apply_rewards(player: &mut PlayerRecord, rewards: &RewardBundle, content: &Content) -> RewardSummary {
    let mut summary = RewardSummary::default();

    if let Some(gold) = rewards.gold {
        player.gold += gold;
        summary.gold = gold;
    }

    for item_id in &rewards.items {
        match content.items.get(item_id) {
            Some(item) => {
                player.add_item(item_id);
                summary.items.push(item.name.clone());
            }
            None => warn!("Skipping unknown reward item '{}' for player {}", item_id, player.user_id),
        }
    }

    if let Some(crystals) = rewards.crystals {
        debug!("Player {} earned {} crystals (not tracked)", player.user_id, crystals);
    }

    if let Some(experience) = rewards.experience {
        summary.experience = experience;
        gain_experience(player, experience, content, &mut summary);
    }

    summary
}

/// Add experience and level up as many times as the total allows
fn gain_experience(player: &mut PlayerRecord, amount: u64, content: &Content, summary: &mut RewardSummary) {
    player.experience += amount;

    while player.experience >= player.level as u64 * EXPERIENCE_PER_LEVEL {
        player.experience -= player.level as u64 * EXPERIENCE_PER_LEVEL;
        player.level += 1;
        player.base_stats.health += HEALTH_PER_LEVEL;
        player.base_stats.attack += ATTACK_PER_LEVEL;
        summary.new_level = Some(player.level);

        let unlocks = player
            .class(content)
            .and_then(|class| class.unlocks.get(&player.level))
            .cloned()
            .unwrap_or_default();
        for ability in unlocks {
            if player.abilities.insert(ability.clone()) {
                summary.unlocked_abilities.push(ability);
            }
        }
    }
}

// =============================================================================
// Quests
// =============================================================================

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QuestStartError {
    #[error("Quest not found.")]
    Unknown,
    #[error("You have already completed this quest!")]
    AlreadyCompleted,
    #[error("This quest is already active!")]
    AlreadyActive,
    #[error("This quest requires level {0}.")]
    LevelTooLow(u32),
    #[error("Complete \"{0}\" first.")]
    PrerequisiteMissing(String),
}

/// Check requirements and add the quest to the active set
pub fn start_quest<'a>(
    player: &mut PlayerRecord,
    quest_id: &str,
    content: &'a Content,
) -> Result<&'a QuestDef, QuestStartError> {
    let quest = content.quests.get(quest_id).ok_or(QuestStartError::Unknown)?;
    if player.completed_quests.contains(quest_id) {
        return Err(QuestStartError::AlreadyCompleted);
    }
    if player.active_quests.contains(quest_id) {
        return Err(QuestStartError::AlreadyActive);
    }
    if let Some(level) = quest.requirements.level {
        if player.level < level {
            return Err(QuestStartError::LevelTooLow(level));
        }
    }
    if let Some(previous) = &quest.requirements.completed_quest {
        if !player.completed_quests.contains(previous) {
            let name = content.quests.get(previous).map(|q| q.name.clone()).unwrap_or_else(|| previous.clone());
            return Err(QuestStartError::PrerequisiteMissing(name));
        }
    }
    player.active_quests.insert(quest_id.to_string());
    Ok(quest)
}

/// Complete every active quest whose kill objectives are met and pay it out
fn complete_finished_quests(player: &mut PlayerRecord, content: &Content) -> Vec<(String, RewardSummary)> {
    let finished: Vec<String> = player
        .active_quests
        .iter()
        .filter(|id| {
            content.quests.get(id.as_str()).is_some_and(|quest| {
                quest
                    .objectives
                    .iter()
                    .all(|(enemy, needed)| player.kills(enemy) >= *needed)
            })
        })
        .cloned()
        .collect();

    finished
        .into_iter()
        .filter_map(|id| {
            let quest = content.quests.get(&id)?;
            player.active_quests.remove(&id);
            player.completed_quests.insert(id);
            let summary = apply_rewards(player, &quest.rewards, content);
            Some((quest.name.clone(), summary))
        })
        .collect()
}

// =============================================================================
// Battle Aftermath
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct VictoryReport {
    pub healed: i64,
    pub effects_expired: bool,
    /// Every boss win adds an artifact slot
    pub boss_defeated: bool,
    /// Quest name and its payout
    pub completed_quests: Vec<(String, RewardSummary)>,
    pub battle_rewards: RewardSummary,
}

/// Apply everything that follows a won battle
pub fn resolve_victory(player: &mut PlayerRecord, enemy: &EnemySnapshot, content: &Content) -> VictoryReport {
    let max_health = player.max_health(content);
    let before = player.base_stats.health;
    let regen = (max_health as f64 * VICTORY_REGEN_FRACTION).floor() as i64;
    player.base_stats.health = (before + regen).min(max_health).max(before);
    let healed = player.base_stats.health - before;

    let effects_expired = player.effects.tick();

    if enemy.is_boss {
        player.defeated_bosses.insert(enemy.id.clone());
        player.artifact_slots += 1;
    }

    player.record_kill(&enemy.id);
    let completed_quests = complete_finished_quests(player, content);

    let mut gold = (enemy.experience as f64 * BATTLE_GOLD_RATIO).floor() as u64;
    if enemy.is_boss {
        gold += BOSS_GOLD_BONUS;
    }
    let battle_rewards = apply_rewards(
        player,
        &RewardBundle {
            experience: Some(enemy.experience),
            gold: Some(gold),
            ..Default::default()
        },
        content,
    );

    VictoryReport {
        healed,
        effects_expired,
        boss_defeated: enemy.is_boss,
        completed_quests,
        battle_rewards,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DefeatReport {
    pub effects_cleared: bool,
    /// Where the player goes once the rest is over
    pub return_to: String,
}

/// Send a beaten player to the camp with restored health
pub fn resolve_defeat(player: &mut PlayerRecord, content: &Content, now: f64) -> DefeatReport {
    let effects_cleared = player.effects.clear();
    player.base_stats.health = player.max_health(content);
    player.location = CAMP_LOCATION.to_string();
    player.camp_entry_time = Some(now);
    DefeatReport {
        effects_cleared,
        return_to: return_location(player, content),
    }
}

/// Location a resting player returns to
pub fn return_location(player: &PlayerRecord, content: &Content) -> String {
    let last = player.last_location.as_str();
    if last != CAMP_LOCATION && content.locations.contains_key(last) {
        last.to_string()
    } else {
        START_LOCATION.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    #[test]
    fn test_experience_rolls_over_several_levels() {
        let content = testing::content();
        let mut player = testing::warrior(&content);
        player.experience = 90;

        let summary = apply_rewards(&mut player, &RewardBundle { experience: Some(250), ..Default::default() }, &content);

        // 340 -> level 2 with 240 -> level 3 with 40
        assert_eq!(player.level, 3);
        assert_eq!(player.experience, 40);
        assert!(player.experience < player.level as u64 * EXPERIENCE_PER_LEVEL);
        assert_eq!(summary.new_level, Some(3));
        assert_eq!(player.base_stats.attack, 14);
        assert_eq!(player.base_stats.health, 140);
        assert_eq!(summary.unlocked_abilities, vec!["Whirlwind".to_string()]);
    }

    #[test]
    fn test_unlocks_are_not_duplicated() {
        let content = testing::content();
        let mut player = testing::warrior(&content);
        player.abilities.insert("Whirlwind".into());

        let summary = apply_rewards(&mut player, &RewardBundle { experience: Some(300), ..Default::default() }, &content);
        assert_eq!(player.level, 3);
        assert!(summary.unlocked_abilities.is_empty());
        assert_eq!(player.abilities.iter().filter(|a| *a == "Whirlwind").count(), 1);
    }

    #[test]
    fn test_rewards_skip_unknown_items() {
        let content = testing::content();
        let mut player = testing::warrior(&content);
        let rewards = RewardBundle {
            gold: Some(15),
            items: vec!["health_potion".into(), "dragon_egg".into()],
            crystals: Some(3),
            ..Default::default()
        };

        let summary = apply_rewards(&mut player, &rewards, &content);
        assert_eq!(player.gold, 65);
        assert_eq!(player.item_count("health_potion"), 1);
        assert_eq!(player.item_count("dragon_egg"), 0);
        assert_eq!(summary.items, vec!["Health Potion".to_string()]);
        assert!(summary.new_level.is_none());
    }

    #[test]
    fn test_start_quest_requirements() {
        let content = testing::content();
        let mut player = testing::warrior(&content);

        assert_eq!(start_quest(&mut player, "wolf_hunt", &content).unwrap_err(), QuestStartError::LevelTooLow(2));
        player.level = 2;
        assert_eq!(
            start_quest(&mut player, "wolf_hunt", &content).unwrap_err(),
            QuestStartError::PrerequisiteMissing("First Steps".into())
        );

        assert!(start_quest(&mut player, "first_steps", &content).is_ok());
        assert_eq!(start_quest(&mut player, "first_steps", &content).unwrap_err(), QuestStartError::AlreadyActive);

        player.active_quests.clear();
        player.completed_quests.insert("first_steps".into());
        assert_eq!(start_quest(&mut player, "first_steps", &content).unwrap_err(), QuestStartError::AlreadyCompleted);
        assert!(start_quest(&mut player, "wolf_hunt", &content).is_ok());
        assert!(player.active_quests.is_disjoint(&player.completed_quests));
    }

    #[test]
    fn test_victory_completes_quest_and_pays_out() {
        let content = testing::content();
        let mut player = testing::warrior(&content);
        player.base_stats.health = 50;
        start_quest(&mut player, "first_steps", &content).unwrap();
        let dummy = EnemySnapshot::from_def("training_dummy", &content.enemies["training_dummy"]);

        let report = resolve_victory(&mut player, &dummy, &content);

        assert_eq!(report.healed, 36);
        assert_eq!(player.kills("training_dummy"), 1);
        assert_eq!(report.completed_quests.len(), 1);
        assert_eq!(report.completed_quests[0].0, "First Steps");
        assert!(player.completed_quests.contains("first_steps"));
        assert!(player.active_quests.is_empty());
        // 50 quest + 50 battle experience
        assert_eq!(player.level, 2);
        assert_eq!(player.experience, 0);
        // 50 + 36 regen + 10 from the level
        assert_eq!(player.base_stats.health, 96);
        // 50 start + 20 quest + 40 battle
        assert_eq!(player.gold, 110);
        assert_eq!(report.battle_rewards.gold, 40);
        assert_eq!(player.item_count("health_potion"), 1);
    }

    #[test]
    fn test_victory_regen_caps_at_max_health() {
        let content = testing::content();
        let mut player = testing::warrior(&content);
        player.base_stats.health = 110;
        let wolf = EnemySnapshot::from_def("wolf", &content.enemies["wolf"]);

        let report = resolve_victory(&mut player, &wolf, &content);
        assert_eq!(report.healed, 10);
        assert_eq!(player.base_stats.health, 120);
    }

    #[test]
    fn test_every_boss_win_grants_a_slot() {
        let content = testing::content();
        let mut player = testing::warrior(&content);
        let boss = EnemySnapshot::from_def("troll_king", &content.bosses["troll_king"]);

        let first = resolve_victory(&mut player, &boss, &content);
        assert!(first.boss_defeated);
        assert_eq!(player.artifact_slots, 2);
        assert_eq!(first.battle_rewards.gold, 240 + BOSS_GOLD_BONUS);

        let second = resolve_victory(&mut player, &boss, &content);
        assert!(second.boss_defeated);
        assert_eq!(second.battle_rewards.gold, 240 + BOSS_GOLD_BONUS);
        assert_eq!(player.artifact_slots, 3);
        assert_eq!(player.defeated_bosses.len(), 1);
    }

    #[test]
    fn test_victory_ticks_effects() {
        let content = testing::content();
        let mut player = testing::warrior(&content);
        player.effects.add("Shield Wall", rpg_shared::StatBlock::new(0, 0, 5), 1);
        let wolf = EnemySnapshot::from_def("wolf", &content.enemies["wolf"]);

        assert!(resolve_victory(&mut player, &wolf, &content).effects_expired);
        assert!(player.effects.is_empty());
    }

    #[test]
    fn test_defeat_resets_health_and_sends_to_camp() {
        let content = testing::content();
        let mut player = testing::warrior(&content);
        player.level = 4;
        player.base_stats.health = -30;
        player.gold = 77;
        player.last_location = "dark_forest".into();
        player.effects.add("Rage", rpg_shared::StatBlock::new(0, 5, 0), 3);

        let report = resolve_defeat(&mut player, &content, 500.0);

        assert!(report.effects_cleared);
        assert!(player.effects.is_empty());
        assert_eq!(player.base_stats.health, 150);
        assert_eq!(player.location, CAMP_LOCATION);
        assert_eq!(player.camp_entry_time, Some(500.0));
        assert_eq!(report.return_to, "dark_forest");
        assert_eq!(player.gold, 77);
    }

    #[test]
    fn test_invalid_last_location_falls_back_to_start() {
        let content = testing::content();
        let mut player = testing::warrior(&content);
        player.last_location = "sunken_temple".into();
        assert_eq!(resolve_defeat(&mut player, &content, 0.0).return_to, START_LOCATION);
    }
}
