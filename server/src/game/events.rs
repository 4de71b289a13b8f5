//! Random events: fatigue-gated rewards and chained encounters.

use log::warn;
use rand::seq::SliceRandom;
use rpg_shared::{
    ChainSceneKind, EventKind, Keyboard, Reply, BTN_ANOTHER_EVENT, BTN_CONTINUE, BTN_RETURN_TO_CITY,
};

use super::mode::{BattleOrigin, ChainCursor, Conversation};
use super::{battle, world, Turn};

pub(super) fn start_random_event(turn: &mut Turn<'_>, city: &str) {
    let content = turn.content;
    turn.player.update_fatigue(turn.now);

    let pool = content.random_events.get(city).map(Vec::as_slice).unwrap_or_default();
    if pool.is_empty() {
        turn.say("🍃 Nothing happens here.");
        return;
    }

    let fatigue = turn.player.fatigue;
    let affordable: Vec<usize> = (0..pool.len()).filter(|&i| pool[i].fatigue_cost <= fatigue).collect();
    let Some(&index) = affordable.choose(&mut *turn.rng) else {
        turn.say(format!(
            "❌ You are too tired! ({}/100)\nRest a little and come back later.",
            fatigue as i64
        ));
        return;
    };
    let event = &pool[index];
    turn.player.spend_fatigue(event.fatigue_cost, turn.now);

    match &event.kind {
        EventKind::Reward { rewards } => {
            *turn.mode = Conversation::RandomEvent { chain: None };
            turn.show(
                Reply::photo(event.image.as_deref(), format!("🎲 {}\n\n{}", event.name, event.description))
                    .with_keyboard(Keyboard::column([BTN_ANOTHER_EVENT, BTN_RETURN_TO_CITY])),
            );
            world::grant_rewards(turn, rewards);
        }
        EventKind::Chain { .. } => {
            turn.say(format!("🎲 {}\n\n{}", event.name, event.description));
            *turn.mode = Conversation::RandomEvent {
                chain: Some(ChainCursor {
                    city: city.to_string(),
                    event: index,
                    next: 0,
                }),
            };
            advance_chain(turn);
        }
    }
    turn.force_save();
}

/// Play chain scenes from the stored cursor until one needs player input
pub(super) fn advance_chain(turn: &mut Turn<'_>) {
    let content = turn.content;
    let Conversation::RandomEvent { chain: Some(cursor) } = &*turn.mode else {
        return;
    };
    let mut cursor = cursor.clone();

    let scenes = content
        .random_events
        .get(&cursor.city)
        .and_then(|pool| pool.get(cursor.event))
        .and_then(|event| match &event.kind {
            EventKind::Chain { scenes } => Some(scenes.as_slice()),
            EventKind::Reward { .. } => None,
        });
    let Some(scenes) = scenes else {
        warn!("Chain event {}#{} is gone", cursor.city, cursor.event);
        world::show_here(turn);
        return;
    };

    while let Some(scene) = scenes.get(cursor.next) {
        cursor.next += 1;
        match &scene.kind {
            ChainSceneKind::Dialogue => {
                turn.show(
                    Reply::photo(scene.image.as_deref(), scene.text.clone())
                        .with_keyboard(Keyboard::column([BTN_CONTINUE])),
                );
                *turn.mode = Conversation::RandomEvent { chain: Some(cursor) };
                return;
            }
            ChainSceneKind::Battle { enemy } => {
                turn.say(format!("⚔️ Ambush!\n\n{}", scene.text));
                battle::start_battle(turn, enemy, BattleOrigin::RandomEvent(cursor));
                return;
            }
            ChainSceneKind::Reward { rewards } => {
                if !scene.text.is_empty() {
                    turn.say(scene.text.clone());
                }
                world::grant_rewards(turn, rewards);
            }
        }
    }

    *turn.mode = Conversation::RandomEvent { chain: None };
    turn.show(
        Reply::text("🏁 The event is over.")
            .with_keyboard(Keyboard::column([BTN_ANOTHER_EVENT, BTN_RETURN_TO_CITY])),
    );
}

pub(super) fn handle(turn: &mut Turn<'_>, text: &str) -> bool {
    let Conversation::RandomEvent { chain } = &*turn.mode else {
        return false;
    };

    if chain.is_some() {
        advance_chain(turn);
        return true;
    }
    match text {
        BTN_ANOTHER_EVENT => {
            let city = turn.player.current_city.clone();
            start_random_event(turn, &city);
            true
        }
        BTN_RETURN_TO_CITY => {
            let city = turn.player.current_city.clone();
            world::show_location(turn, &city);
            true
        }
        _ => false,
    }
}
