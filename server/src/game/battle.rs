//! Battle screens on top of the turn engine.

use std::mem;

use log::{info, warn};
use rpg_shared::{
    describe_resistances, Keyboard, Reply, ABILITY_PREFIX, BTN_ATTACK, BTN_BACK, BTN_FLEE, BTN_POTIONS,
    CAMP_LOCATION, POTION_PREFIX,
};

use super::mode::{BattleOrigin, BattleState, Conversation};
use super::{events, world, FollowUp, Turn};
use crate::battle::{BattleEvent, BattleSession, PlayerAction, TurnOutcome};
use crate::progression;

pub(super) fn start_battle(turn: &mut Turn<'_>, enemy_id: &str, origin: BattleOrigin) {
    let content = turn.content;
    let Some(session) = BattleSession::start(enemy_id, turn.player, content) else {
        warn!("Player {} tried to fight unknown enemy '{}'", turn.player.user_id, enemy_id);
        turn.say("❌ This enemy is nowhere to be found.");
        return;
    };

    let enemy = &session.enemy;
    let mut caption = format!(
        "⚔️ Battle with {}!\n\n❤️ HP: {}\n⚔️ ATK: {}",
        enemy.name, enemy.max_health, enemy.attack
    );
    if !turn.player.effects.is_empty() {
        let names: Vec<&str> = turn.player.effects.iter().map(|e| e.name.as_str()).collect();
        caption.push_str(&format!("\n\n🧪 Your active effects: {}", names.join(", ")));
    }
    let resistances = describe_resistances(&enemy.resistances);
    if !resistances.is_empty() {
        caption.push_str(&format!("\n🛡️ Resistances: {}", resistances.join(" ")));
    }
    let reply = Reply::photo(enemy.image.as_deref(), caption).with_keyboard(battle_keyboard(turn));

    info!("Player {} engages {}", turn.player.user_id, enemy_id);
    *turn.mode = Conversation::Battle(Box::new(BattleState {
        session,
        origin,
        potion_menu: false,
    }));
    turn.show(reply);
}

fn battle_keyboard(turn: &Turn<'_>) -> Keyboard {
    let abilities = turn.player.all_abilities(turn.content);
    let mut labels = vec![BTN_ATTACK.to_string()];
    labels.extend(abilities.iter().map(|name| format!("{}{}", ABILITY_PREFIX, name)));
    labels.push(BTN_POTIONS.to_string());
    labels.push(BTN_FLEE.to_string());
    Keyboard::grid(labels, 2)
}

fn potion_keyboard(turn: &Turn<'_>) -> Option<Keyboard> {
    let content = turn.content;
    let labels: Vec<String> = turn
        .player
        .inventory
        .iter()
        .filter_map(|(id, count)| {
            let item = content.items.get(id)?;
            let usable = item.is_consumable() && (item.heal_amount() > 0 || item.buffs.is_some());
            usable.then(|| format!("{}{} x{}", POTION_PREFIX, item.name, count))
        })
        .collect();
    if labels.is_empty() {
        None
    } else {
        Some(Keyboard::grid(labels, 2).with_row([BTN_BACK]))
    }
}

/// Input while fighting. Anything unrecognised re-shows the battle keyboard.
pub(super) fn handle(turn: &mut Turn<'_>, text: &str) -> bool {
    let Conversation::Battle(mut state) = mem::take(&mut *turn.mode) else {
        return false;
    };

    if text == BTN_POTIONS {
        match potion_keyboard(turn) {
            Some(keyboard) => {
                state.potion_menu = true;
                turn.show(Reply::text("🧪 Choose a potion:").with_keyboard(keyboard));
            }
            None => turn.say("❌ You have no potions!"),
        }
        *turn.mode = Conversation::Battle(state);
        return true;
    }
    if text == BTN_BACK && state.potion_menu {
        state.potion_menu = false;
        let keyboard = battle_keyboard(turn);
        turn.show(Reply::text("⚔️ Back to the fight!").with_keyboard(keyboard));
        *turn.mode = Conversation::Battle(state);
        return true;
    }

    let potion_id;
    let action = if state.potion_menu {
        // only a potion or Back while the menu is open
        let Some(label) = text.strip_prefix(POTION_PREFIX) else {
            match potion_keyboard(turn) {
                Some(keyboard) => turn.show(Reply::text("🧪 Choose a potion or go back.").with_keyboard(keyboard)),
                None => {
                    state.potion_menu = false;
                    let keyboard = battle_keyboard(turn);
                    turn.show(Reply::text("❌ You have no potions!").with_keyboard(keyboard));
                }
            }
            *turn.mode = Conversation::Battle(state);
            return true;
        };
        let name = label.rsplit_once(" x").map_or(label, |(name, _)| name);
        match turn.content.item_by_name(name) {
            Some((id, _)) => {
                potion_id = id.clone();
                PlayerAction::Potion(&potion_id)
            }
            None => {
                turn.say("❌ Potion not found.");
                *turn.mode = Conversation::Battle(state);
                return true;
            }
        }
    } else if text == BTN_ATTACK {
        PlayerAction::Attack
    } else if text == BTN_FLEE {
        PlayerAction::Flee
    } else if let Some(name) = text.strip_prefix(ABILITY_PREFIX) {
        PlayerAction::Ability(name)
    } else {
        let keyboard = battle_keyboard(turn);
        turn.show(Reply::text("⚔️ You are in battle! Choose an action.").with_keyboard(keyboard));
        *turn.mode = Conversation::Battle(state);
        return true;
    };

    let report = state.session.resolve_turn(action, turn.player, turn.content, &mut *turn.rng);
    for event in &report.events {
        turn.say(event_line(event));
    }

    match report.outcome {
        TurnOutcome::Rejected(message) => {
            turn.say(format!("❌ {}", message));
            *turn.mode = Conversation::Battle(state);
        }
        TurnOutcome::Continue => {
            state.potion_menu = false;
            let status = format!(
                "👹 {}: {}/{} HP\n❤️ You: {}/{} HP",
                state.session.enemy.name,
                state.session.enemy_health,
                state.session.enemy.max_health,
                state.session.player_health,
                turn.player.max_health(turn.content)
            );
            let keyboard = battle_keyboard(turn);
            turn.show(Reply::text(status).with_keyboard(keyboard));
            *turn.mode = Conversation::Battle(state);
        }
        TurnOutcome::PhaseTransition { phase, message } => {
            state.potion_menu = false;
            let enemy = &state.session.enemy;
            let caption = format!(
                "⚠️ {} RISES AGAIN! (Phase {})\n\n{}\n\n❤️ HP: {}\n⚔️ ATK: {}",
                enemy.name.to_uppercase(),
                phase,
                message,
                state.session.enemy_health,
                enemy.attack
            );
            let reply = Reply::photo(enemy.image.as_deref(), caption).with_keyboard(battle_keyboard(turn));
            turn.show(reply);
            *turn.mode = Conversation::Battle(state);
        }
        TurnOutcome::Victory => victory(turn, *state),
        TurnOutcome::Defeat => defeat(turn, &state.session),
        TurnOutcome::Fled { effects_expired } => {
            turn.say("🏃 You fled from the battle!");
            if effects_expired {
                turn.say("⌛ Some of your effects have worn off.");
            }
            let city = turn.player.current_city.clone();
            world::show_location(turn, &city);
            turn.force_save();
        }
    }
    true
}

fn event_line(event: &BattleEvent) -> String {
    match event {
        BattleEvent::PlayerHit { damage } => format!("⚔️ You deal {} damage!", damage),
        BattleEvent::AbilityUsed { name, uses, max_uses, hits } => {
            let parts: Vec<String> = hits
                .iter()
                .map(|(damage_type, damage)| format!("{}{}", damage_type.icon(), damage))
                .collect();
            let total: i64 = hits.iter().map(|(_, damage)| damage).sum();
            if hits.is_empty() {
                format!("🔮 {} ({}/{})", name, uses, max_uses)
            } else {
                format!("🔮 {} ({}/{}) deals {} damage! [{}]", name, uses, max_uses, total, parts.join(" "))
            }
        }
        BattleEvent::DotApplied { name, damage_type, damage, duration, refreshed } => {
            let verb = if *refreshed { "refreshed" } else { "applied" };
            format!(
                "{} {} {}: {} damage per turn for {} turns",
                damage_type.icon(),
                name,
                verb,
                damage,
                duration
            )
        }
        BattleEvent::Healed { amount } => format!("💚 You restore {} health!", amount),
        BattleEvent::DefenseBuff { amount } => format!("🛡️ Defense +{} until the end of the battle", amount),
        BattleEvent::PotionUsed { item, healed, buff } => {
            let mut line = format!("🍺 You drink {}", item);
            if *healed > 0 {
                line.push_str(&format!(", +{} health", healed));
            }
            if let Some((stats, duration)) = buff {
                line.push_str(&format!(", {} for {} battles", stats.describe().join(" "), duration));
            }
            line
        }
        BattleEvent::DotTick { name, damage_type, damage } => {
            format!("{} {} deals {} damage", damage_type.icon(), name, damage)
        }
        BattleEvent::EnemyHit { name, damage } => format!("👹 {} deals {} damage to you!", name, damage),
    }
}

fn victory(turn: &mut Turn<'_>, state: BattleState) {
    let enemy = &state.session.enemy;
    let report = progression::resolve_victory(turn.player, enemy, turn.content);
    info!("Player {} defeated {}", turn.player.user_id, enemy.id);

    let mut text = format!("🎉 Victory! You defeated {}!", enemy.name);
    if report.healed > 0 {
        text.push_str(&format!("\n❤️ You recover {} health.", report.healed));
    }
    if report.effects_expired {
        text.push_str("\n⌛ Some of your effects have worn off.");
    }
    if report.boss_defeated {
        text.push_str(&format!("\n👑 Boss defeated! +{} bonus gold", progression::BOSS_GOLD_BONUS));
        text.push_str(&format!("\n🔓 New artifact slot! ({} total)", turn.player.artifact_slots));
    }
    turn.say(text);

    for (quest, summary) in &report.completed_quests {
        turn.say(format!("✅ Quest completed: {}\n{}", quest, summary.lines().join("\n")));
    }
    turn.say(world::reward_text(&report.battle_rewards));
    turn.force_save();

    match state.origin {
        BattleOrigin::Location => world::show_here(turn),
        BattleOrigin::Story(cursor) => world::advance_story(turn, &cursor),
        BattleOrigin::RandomEvent(cursor) => {
            *turn.mode = Conversation::RandomEvent { chain: Some(cursor) };
            events::advance_chain(turn);
        }
    }
}

fn defeat(turn: &mut Turn<'_>, session: &BattleSession) {
    let report = progression::resolve_defeat(turn.player, turn.content, turn.now);
    info!("Player {} was defeated by {}", turn.player.user_id, session.enemy.id);

    let mut text = format!("💀 {} has defeated you!", session.enemy.name);
    if report.effects_cleared {
        text.push_str("\n⌛ All your effects were lost.");
    }
    turn.say(text);

    let content = turn.content;
    let camp = content.locations.get(CAMP_LOCATION);
    let caption = format!(
        "🏕️ You wake up at the camp.\n\nYou need {} seconds of rest before you can continue.",
        turn.defeat_rest.as_secs()
    );
    turn.show(Reply::photo(camp.and_then(|c| c.image.as_deref()), caption).with_keyboard(Keyboard::Remove));

    *turn.mode = Conversation::Idle;
    turn.follow_up = Some(FollowUp::Rest);
    turn.force_save();
}
