//! Class selection, locations, quests, story, teleport and the stats screen.

use log::warn;
use rpg_shared::{
    ActionKind, Keyboard, LocationAction, LocationDef, Reply, RewardBundle, SceneKind, BTN_BACK,
    BTN_BACK_TO_CLASSES, BTN_CHOOSE_CLASS, BTN_CONTINUE, BTN_INVENTORY, BTN_RETURN_TO_CITY, BTN_SAVE,
    BTN_STATS, BTN_TELEPORT, BTN_TO_CITY, CAMP_LOCATION, CLASS_PREFIX, CLASS_SELECTION, FIRST_QUEST,
    START_LOCATION, TELEPORT_PREFIX,
};

use super::mode::{BattleOrigin, Conversation, StoryCursor};
use super::{battle, events, inventory, Turn};
use crate::entities::PlayerRecord;
use crate::progression::{self, RewardSummary};

// =============================================================================
// Class Selection
// =============================================================================

pub(super) fn show_class_selection(turn: &mut Turn<'_>) {
    let content = turn.content;
    turn.player.location = CLASS_SELECTION.to_string();
    *turn.mode = Conversation::ClassSelection { selected: None };

    let labels = content.classes.values().map(|class| format!("{}{}", CLASS_PREFIX, class.name));
    turn.show(
        Reply::photo(None, "🎯 Choose your class\n\nTap a class to see its stats.")
            .with_keyboard(Keyboard::grid(labels, 2)),
    );
}

pub(super) fn handle_class_selection(turn: &mut Turn<'_>, text: &str) {
    let content = turn.content;

    if let Some(name) = text.strip_prefix(CLASS_PREFIX) {
        let Some((class_id, class)) = content.class_by_name(name) else {
            show_class_selection(turn);
            return;
        };

        let abilities: Vec<String> = class.starting_abilities.iter().map(|a| format!("• {}", a)).collect();
        let caption = format!(
            "{}\n\n{}\n\n💪 Stats:\n❤️ HP: {}\n⚔️ ATK: {}\n🛡️ DEF: {}\n\n🔮 Abilities:\n{}",
            class.name,
            class.description,
            class.base_stats.health,
            class.base_stats.attack,
            class.base_stats.defense,
            abilities.join("\n")
        );
        *turn.mode = Conversation::ClassSelection { selected: Some(class_id.clone()) };
        turn.show(
            Reply::photo(class.image.as_deref(), caption)
                .with_keyboard(Keyboard::column([BTN_CHOOSE_CLASS, BTN_BACK_TO_CLASSES])),
        );
        return;
    }

    if text == BTN_CHOOSE_CLASS {
        let selected = match &*turn.mode {
            Conversation::ClassSelection { selected: Some(id) } => id.clone(),
            _ => {
                show_class_selection(turn);
                return;
            }
        };
        let Some(class) = content.classes.get(&selected) else {
            show_class_selection(turn);
            return;
        };

        turn.player.choose_class(&selected, class);
        turn.show(
            Reply::text(format!("🎉 You are now a {}!\n\nYou are ready for adventure.", class.name))
                .with_keyboard(Keyboard::Remove),
        );
        turn.say("You wake up in a small village. The elder asks you to come and see him.");
        offer_quest(turn, FIRST_QUEST);
        show_location(turn, START_LOCATION);
        turn.force_save();
        return;
    }

    show_class_selection(turn);
}

/// `/start`
pub(super) fn welcome(turn: &mut Turn<'_>) {
    if turn.player.class_id.is_none() {
        show_class_selection(turn);
        return;
    }
    if matches!(turn.mode, Conversation::Battle(_)) {
        turn.say("⚔️ You are in a battle! Finish it or flee.");
        return;
    }
    turn.say("👋 Welcome back! Let's continue the journey.");
    show_here(turn);
}

// =============================================================================
// Resting
// =============================================================================

/// Answer a resting player, or end the rest once it has run out
pub(super) fn check_rest(turn: &mut Turn<'_>) {
    let rest = turn.defeat_rest.as_secs_f64();
    let elapsed = turn.player.camp_entry_time.map(|since| turn.now - since);
    match elapsed {
        Some(elapsed) if elapsed < rest => {
            turn.say(format!("💤 You are recovering your strength... ({}s left)", (rest - elapsed).ceil() as i64));
        }
        _ => finish_rest(turn),
    }
}

pub(super) fn finish_rest(turn: &mut Turn<'_>) {
    let destination = progression::return_location(turn.player, turn.content);
    turn.player.camp_entry_time = None;
    turn.say("⏰ Your rest is over! Back to the adventure.");
    show_location(turn, &destination);
    turn.force_save();
}

// =============================================================================
// Locations
// =============================================================================

/// Show the location the player stands at, or their city when that is not a real place
pub(super) fn show_here(turn: &mut Turn<'_>) {
    let location = if turn.player.location == CLASS_SELECTION || turn.player.location == CAMP_LOCATION {
        turn.player.current_city.clone()
    } else {
        turn.player.location.clone()
    };
    show_location(turn, &location);
}

pub(super) fn show_location(turn: &mut Turn<'_>, location_id: &str) {
    let content = turn.content;
    let found = content.locations.get_key_value(location_id).or_else(|| {
        warn!("Unknown location '{}' for player {}", location_id, turn.player.user_id);
        content
            .locations
            .get_key_value(turn.player.current_city.as_str())
            .or_else(|| content.locations.get_key_value(START_LOCATION))
    });
    let Some((location_id, location)) = found else {
        turn.say("❌ This place does not exist anymore.");
        return;
    };

    *turn.mode = Conversation::Idle;
    let player = &mut *turn.player;
    player.location = location_id.clone();
    player.last_location = location_id.clone();
    player.visited_locations.insert(location_id.clone());
    player.unlock_location(location_id);
    if location.is_city {
        player.current_city = location_id.clone();
    }

    let actions = location
        .actions
        .iter()
        .filter(|action| action_visible(player, action, content))
        .map(|action| action.text.clone());
    let mut keyboard = Keyboard::grid(actions, 2);
    if location.is_city && unlocked_cities(player, content).count() > 1 {
        keyboard = keyboard.with_row([BTN_TELEPORT]);
    }
    keyboard = keyboard.with_row([BTN_STATS, BTN_INVENTORY]);
    if !location.is_city {
        keyboard = keyboard.with_row([BTN_TO_CITY]);
    }

    turn.show(
        Reply::photo(location.image.as_deref(), format!("{}\n\n{}", location.name, location.description))
            .with_keyboard(keyboard),
    );
}

fn action_visible(player: &PlayerRecord, action: &LocationAction, content: &rpg_shared::Content) -> bool {
    match &action.kind {
        ActionKind::Story { target } if player.has_completed_story(target, content) => return false,
        ActionKind::Location { target } => {
            let locked = content.locations.get(target).is_some_and(|location| location.locked);
            if locked && !player.unlocked_locations.contains(target) {
                return false;
            }
        }
        _ => {}
    }
    if action.required_level > player.level {
        return false;
    }
    match &action.required_quest {
        Some(quest) => player.completed_quests.contains(quest),
        None => true,
    }
}

fn unlocked_cities<'a>(
    player: &'a PlayerRecord,
    content: &'a rpg_shared::Content,
) -> impl Iterator<Item = (&'a String, &'a LocationDef)> + 'a {
    player
        .unlocked_locations
        .iter()
        .filter_map(|id| content.locations.get_key_value(id.as_str()))
        .filter(|(_, location)| location.is_city)
}

/// Run the action whose button matches `text`. False when nothing matched.
pub(super) fn handle_location_action(turn: &mut Turn<'_>, text: &str) -> bool {
    let content = turn.content;
    let Some(location) = content.locations.get(&turn.player.location) else {
        return false;
    };
    let Some(action) = location
        .actions
        .iter()
        .find(|action| action.text == text && action_visible(turn.player, action, content))
    else {
        return false;
    };

    match &action.kind {
        ActionKind::Location { target } => show_location(turn, target),
        ActionKind::Battle { target } => battle::start_battle(turn, target, BattleOrigin::Location),
        ActionKind::Quest { target } => offer_quest(turn, target),
        ActionKind::Story { target } => start_story(turn, target),
        ActionKind::Shop { shop_items } => inventory::open_shop(turn, shop_items.clone()),
        ActionKind::RandomEvents { target } => events::start_random_event(turn, target),
    }
    true
}

// =============================================================================
// Quests and Rewards
// =============================================================================

pub(super) fn offer_quest(turn: &mut Turn<'_>, quest_id: &str) {
    let content = turn.content;
    let quest = match progression::start_quest(turn.player, quest_id, content) {
        Ok(quest) => quest,
        Err(progression::QuestStartError::Unknown) => {
            warn!("Player {} asked for unknown quest '{}'", turn.player.user_id, quest_id);
            return;
        }
        Err(e @ (progression::QuestStartError::AlreadyCompleted | progression::QuestStartError::AlreadyActive)) => {
            turn.say(format!("ℹ️ {}", e));
            return;
        }
        Err(e) => {
            turn.say(format!("❌ {}", e));
            return;
        }
    };

    let mut text = format!("📜 New quest: {}\n\n{}", quest.name, quest.description);
    if !quest.objectives.is_empty() {
        text.push_str("\n\n🎯 Objectives:");
        for (enemy_id, needed) in &quest.objectives {
            let name = content.enemy(enemy_id).map(|e| e.name.as_str()).unwrap_or(enemy_id);
            text.push_str(&format!("\n• Defeat {}: {}/{}", name, turn.player.kills(enemy_id), needed));
        }
    }
    if !quest.rewards.is_empty() {
        text.push_str("\n\n🎁 Rewards:");
        if let Some(experience) = quest.rewards.experience {
            text.push_str(&format!("\n• Experience: {}", experience));
        }
        if let Some(gold) = quest.rewards.gold {
            text.push_str(&format!("\n• Gold: {}", gold));
        }
        if !quest.rewards.items.is_empty() {
            let names: Vec<&str> = quest.rewards.items.iter().map(|id| content.item_name(id)).collect();
            text.push_str(&format!("\n• Items: {}", names.join(", ")));
        }
    }
    turn.say(text);
    turn.force_save();
}

/// Apply a reward bundle and tell the player what they got
pub(super) fn grant_rewards(turn: &mut Turn<'_>, rewards: &RewardBundle) {
    let summary = progression::apply_rewards(turn.player, rewards, turn.content);
    turn.say(reward_text(&summary));
    turn.force_save();
}

pub(super) fn reward_text(summary: &RewardSummary) -> String {
    let lines = summary.lines();
    if lines.is_empty() {
        "ℹ️ No rewards this time.".to_string()
    } else {
        format!("🎁 Received:\n{}", lines.join("\n"))
    }
}

// =============================================================================
// Story
// =============================================================================

pub(super) fn start_story(turn: &mut Turn<'_>, city: &str) {
    let content = turn.content;
    let Some(first) = content.storyline(city).and_then(|scenes| scenes.first()) else {
        turn.say("❌ This storyline is not available right now.");
        return;
    };
    let scene_id = turn
        .player
        .story_progress
        .entry(city.to_string())
        .or_insert_with(|| first.id.clone())
        .clone();
    show_story_scene(turn, city, &scene_id);
}

pub(super) fn show_story_scene(turn: &mut Turn<'_>, city: &str, scene_id: &str) {
    let content = turn.content;
    let Some(scene) = content.scene(city, scene_id) else {
        warn!("Story scene '{}' of '{}' is gone", scene_id, city);
        show_here(turn);
        return;
    };
    let cursor = StoryCursor {
        city: city.to_string(),
        scene: scene_id.to_string(),
    };

    match &scene.kind {
        SceneKind::Dialogue => {
            *turn.mode = Conversation::Story(cursor);
            let mut buttons = Vec::new();
            if scene.next_scene.is_some() {
                buttons.push(BTN_CONTINUE);
            }
            buttons.push(BTN_RETURN_TO_CITY);
            let title = scene.title.as_deref().unwrap_or("Story");
            turn.show(
                Reply::photo(scene.image.as_deref(), format!("📖 {}\n\n{}", title, scene.text))
                    .with_keyboard(Keyboard::column(buttons)),
            );
        }
        SceneKind::Battle { enemy } => {
            turn.say(format!("⚔️ Story battle!\n\n{}", scene.text));
            battle::start_battle(turn, enemy, BattleOrigin::Story(cursor));
        }
        SceneKind::Location { target, rewards, unlock_city } => {
            if let Some(rewards) = rewards {
                grant_rewards(turn, rewards);
            }
            if let Some(city_id) = unlock_city {
                turn.player.unlock_location(city_id);
                let name = content.locations.get(city_id).map(|l| l.name.as_str()).unwrap_or(city_id);
                turn.say(format!("🔓 Unlocked: {}!", name));
            }
            turn.player.story_progress.insert(city.to_string(), scene_id.to_string());
            turn.say(scene.text.clone());
            show_location(turn, target);
            turn.force_save();
        }
    }
}

/// Move the storyline on from `cursor`. Without a next scene the player goes home.
pub(super) fn advance_story(turn: &mut Turn<'_>, cursor: &StoryCursor) {
    let next = turn
        .content
        .scene(&cursor.city, &cursor.scene)
        .and_then(|scene| scene.next_scene.clone());
    match next {
        Some(next) => {
            turn.player.story_progress.insert(cursor.city.clone(), next.clone());
            show_story_scene(turn, &cursor.city, &next);
        }
        None => show_here(turn),
    }
}

pub(super) fn handle_story(turn: &mut Turn<'_>, text: &str) -> bool {
    let Conversation::Story(cursor) = &*turn.mode else {
        return false;
    };
    let cursor = cursor.clone();

    match text {
        BTN_RETURN_TO_CITY => {
            let city = turn.player.current_city.clone();
            show_location(turn, &city);
        }
        BTN_CONTINUE => advance_story(turn, &cursor),
        _ => show_story_scene(turn, &cursor.city, &cursor.scene),
    }
    true
}

// =============================================================================
// Teleport
// =============================================================================

pub(super) fn show_teleport(turn: &mut Turn<'_>) {
    let content = turn.content;
    let labels: Vec<String> = unlocked_cities(turn.player, content)
        .filter(|(id, _)| **id != turn.player.current_city)
        .map(|(_, city)| format!("{}{}", TELEPORT_PREFIX, city.name))
        .collect();
    *turn.mode = Conversation::Teleport;
    turn.show(
        Reply::text("🌀 Teleport\nChoose a city:").with_keyboard(Keyboard::grid(labels, 2).with_row([BTN_BACK])),
    );
}

pub(super) fn handle_teleport(turn: &mut Turn<'_>, text: &str) -> bool {
    if text == BTN_BACK {
        let city = turn.player.current_city.clone();
        show_location(turn, &city);
        return true;
    }
    let Some(name) = text.strip_prefix(TELEPORT_PREFIX) else {
        return false;
    };

    let content = turn.content;
    let destination = unlocked_cities(turn.player, content)
        .find(|(_, city)| city.name == name)
        .map(|(id, city)| (id.clone(), city.name.clone()));
    match destination {
        Some((city_id, city_name)) => {
            turn.say(format!("✨ Travelling to {}...", city_name));
            show_location(turn, &city_id);
        }
        None => show_teleport(turn),
    }
    true
}

// =============================================================================
// Stats
// =============================================================================

pub(super) fn show_stats(turn: &mut Turn<'_>) {
    let content = turn.content;
    turn.player.update_fatigue(turn.now);
    let player = &*turn.player;
    let stats = player.total_stats(content);
    let class = player.class(content);
    let location = content
        .locations
        .get(&player.location)
        .map(|l| l.name.as_str())
        .unwrap_or("Unknown");

    let mut text = format!(
        "📊 {} (level {})\n❤️ Health: {}/{}\n⚔️ Attack: {}\n🛡️ Defense: {}\n💰 Gold: {}\n😴 Fatigue: {}%\n📈 Experience: {}/{}\n📍 Location: {}\n📜 Active quests: {}",
        class.map(|c| c.name.as_str()).unwrap_or("Hero"),
        player.level,
        stats.health,
        player.max_health(content),
        stats.attack,
        stats.defense,
        player.gold,
        player.fatigue as i64,
        player.experience,
        player.level as u64 * progression::EXPERIENCE_PER_LEVEL,
        location,
        player.active_quests.len(),
    );

    if !player.effects.is_empty() {
        text.push_str("\n\n🧪 Active effects:");
        for effect in player.effects.iter() {
            text.push_str(&format!("\n• {} ({} battles)", effect.name, effect.duration));
        }
    }
    if !player.equipped_artifacts.is_empty() {
        text.push_str(&format!(
            "\n\n🛡️ Equipped artifacts ({}/{}):",
            player.equipped_artifacts.len(),
            player.artifact_slots
        ));
        for item_id in &player.equipped_artifacts {
            text.push_str(&format!("\n• {}", content.item_name(item_id)));
        }
    }

    let image = class.and_then(|c| c.image.as_deref());
    *turn.mode = Conversation::Stats;
    turn.show(Reply::photo(image, text).with_keyboard(Keyboard::column([BTN_SAVE, BTN_BACK])));
}

pub(super) fn handle_stats(turn: &mut Turn<'_>, text: &str) -> bool {
    if text == BTN_BACK {
        show_here(turn);
        return true;
    }
    false
}
