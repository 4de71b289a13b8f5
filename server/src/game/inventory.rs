//! Inventory and shop screens.

use log::debug;
use rpg_shared::{
    Content, ItemDef, ItemType, Keyboard, Reply, BTN_BACK, BTN_CONFIRM_BUY, BTN_CONFIRM_SELL, BTN_EQUIP,
    BTN_SELL_ITEMS, BTN_UNEQUIP, BTN_USE,
};

use super::mode::{Conversation, ShopState, ShopView};
use super::{world, Turn};
use crate::entities::PlayerRecord;

fn item_details(item: &ItemDef) -> String {
    let kind = match item.item_type {
        ItemType::Consumable => "Consumable",
        ItemType::Artifact => "Artifact",
        ItemType::Material => "Material",
        ItemType::Quest => "Quest item",
    };
    let mut text = format!("{}\n\n{}\n\n📦 Type: {}", item.name, item.description, kind);
    let stats = item.stats.describe();
    if !stats.is_empty() {
        text.push_str(&format!("\n📊 {}", stats.join(", ")));
    }
    if let Some(buff) = &item.buffs {
        text.push_str(&format!(
            "\n✨ Buff: {} for {} battles",
            buff.stats.describe().join(", "),
            buff.duration
        ));
    }
    text.push_str(&format!("\n💰 Price: {}", item.price));
    text
}

// =============================================================================
// Inventory
// =============================================================================

fn inventory_label(name: &str, count: u32, equipped: bool) -> String {
    if equipped {
        format!("{} x{} (E)", name, count)
    } else {
        format!("{} x{}", name, count)
    }
}

pub(super) fn show_inventory(turn: &mut Turn<'_>) {
    let content = turn.content;
    let player = &*turn.player;
    let labels: Vec<String> = player
        .inventory
        .iter()
        .map(|(id, count)| inventory_label(content.item_name(id), *count, player.equipped_artifacts.contains(id)))
        .collect();

    let text = if labels.is_empty() {
        format!("🎒 Your inventory is empty.\n💰 Gold: {}", player.gold)
    } else {
        format!(
            "🎒 Inventory\n💰 Gold: {}\n🛡️ Artifact slots: {}/{}",
            player.gold,
            player.equipped_artifacts.len(),
            player.artifact_slots
        )
    };
    *turn.mode = Conversation::Inventory { viewing: None };
    turn.show(Reply::text(text).with_keyboard(Keyboard::grid(labels, 2).with_row([BTN_BACK])));
}

fn show_item(turn: &mut Turn<'_>, item_id: &str) {
    let content = turn.content;
    let Some(item) = content.items.get(item_id) else {
        show_inventory(turn);
        return;
    };

    let mut buttons = Vec::new();
    if item.is_consumable() {
        buttons.push(BTN_USE);
    }
    if item.is_artifact() {
        if turn.player.equipped_artifacts.contains(item_id) {
            buttons.push(BTN_UNEQUIP);
        } else {
            buttons.push(BTN_EQUIP);
        }
    }
    buttons.push(BTN_BACK);

    let caption = format!("{}\n\n🎒 You have: {}", item_details(item), turn.player.item_count(item_id));
    *turn.mode = Conversation::Inventory {
        viewing: Some(item_id.to_string()),
    };
    turn.show(Reply::photo(item.image.as_deref(), caption).with_keyboard(Keyboard::column(buttons)));
}

pub(super) fn handle_inventory(turn: &mut Turn<'_>, text: &str) -> bool {
    let Conversation::Inventory { viewing } = &*turn.mode else {
        return false;
    };
    let viewing = viewing.clone();

    match (text, viewing) {
        (BTN_BACK, Some(_)) => show_inventory(turn),
        (BTN_BACK, None) => world::show_here(turn),
        (BTN_USE, Some(item_id)) => use_item(turn, &item_id),
        (BTN_EQUIP, Some(item_id)) => {
            match turn.player.equip_artifact(&item_id, turn.content) {
                Ok(()) => {
                    turn.say(format!("🛡️ {} equipped!", turn.content.item_name(&item_id)));
                    turn.force_save();
                }
                Err(e) => turn.say(format!("❌ {}", e)),
            }
            show_item(turn, &item_id);
        }
        (BTN_UNEQUIP, Some(item_id)) => {
            match turn.player.unequip_artifact(&item_id) {
                Ok(()) => {
                    turn.say(format!("🔻 {} unequipped.", turn.content.item_name(&item_id)));
                    turn.force_save();
                }
                Err(e) => turn.say(format!("❌ {}", e)),
            }
            show_item(turn, &item_id);
        }
        _ => {
            let content = turn.content;
            let player = &*turn.player;
            let selected = player.inventory.iter().find_map(|(id, count)| {
                let label = inventory_label(content.item_name(id), *count, player.equipped_artifacts.contains(id));
                (label == text).then(|| id.clone())
            });
            match selected {
                Some(item_id) => show_item(turn, &item_id),
                None => return false,
            }
        }
    }
    true
}

/// Consume one item outside of battle
fn use_item(turn: &mut Turn<'_>, item_id: &str) {
    let content = turn.content;
    let item = match content.items.get(item_id) {
        Some(item) if item.is_consumable() && turn.player.item_count(item_id) > 0 => item,
        _ => {
            turn.say("❌ You can't use this item.");
            show_inventory(turn);
            return;
        }
    };

    let max_health = turn.player.max_health(content);
    let heal = item.heal_amount();
    if heal > 0 && item.buffs.is_none() && turn.player.base_stats.health >= max_health {
        turn.say("❤️ Your health is already full!");
        show_item(turn, item_id);
        return;
    }

    let player = &mut *turn.player;
    player.remove_item(item_id);
    let mut lines = vec![format!("🍺 You used {}.", item.name)];
    if heal > 0 {
        let before = player.base_stats.health;
        player.base_stats.health = (before + heal).min(max_health).max(before);
        lines.push(format!("❤️ +{} health ({}/{})", player.base_stats.health - before, player.base_stats.health, max_health));
    }
    if let Some(buff) = &item.buffs {
        player.effects.add(item.name.clone(), buff.stats, buff.duration);
        lines.push(format!("✨ {} for {} battles", buff.stats.describe().join(", "), buff.duration));
    }
    debug!("Player {} used {}", player.user_id, item_id);

    turn.say(lines.join("\n"));
    turn.force_save();
    if turn.player.item_count(item_id) > 0 {
        show_item(turn, item_id);
    } else {
        show_inventory(turn);
    }
}

// =============================================================================
// Shop
// =============================================================================

fn buy_label(item: &ItemDef) -> String {
    format!("{} ({}💰)", item.name, item.price)
}

fn sell_label(item: &ItemDef, count: u32) -> String {
    format!("{} ({}💰) x{}", item.name, item.sell_price(), count)
}

pub(super) fn open_shop(turn: &mut Turn<'_>, items: Vec<String>) {
    show_shop_menu(turn, items);
}

fn show_shop_menu(turn: &mut Turn<'_>, items: Vec<String>) {
    let content = turn.content;
    let labels: Vec<String> = items
        .iter()
        .filter_map(|id| content.items.get(id))
        .map(buy_label)
        .collect();
    let text = format!("🏪 Welcome to the shop!\n💰 Your gold: {}", turn.player.gold);
    *turn.mode = Conversation::Shop(ShopState {
        items,
        view: ShopView::Buying,
    });
    turn.show(
        Reply::text(text).with_keyboard(
            Keyboard::grid(labels, 2)
                .with_row([BTN_SELL_ITEMS])
                .with_row([BTN_BACK]),
        ),
    );
}

/// Items the player may sell, with how many copies can go
fn sellable<'a>(turn: &'a Turn<'_>) -> impl Iterator<Item = (&'a String, &'a ItemDef, u32)> + 'a {
    let content: &'a Content = turn.content;
    let player: &'a PlayerRecord = &*turn.player;
    player
        .inventory
        .iter()
        .filter_map(move |(id, count)| {
            // the equipped copy stays, spares can go
            let spare = count - u32::from(player.equipped_artifacts.contains(id));
            let item = content.items.get(id)?;
            (spare > 0).then_some((id, item, spare))
        })
}

fn show_sell_menu(turn: &mut Turn<'_>, items: Vec<String>) {
    let labels: Vec<String> = sellable(turn).map(|(_, item, count)| sell_label(item, count)).collect();
    if labels.is_empty() {
        turn.say("🎒 You have nothing to sell.");
        show_shop_menu(turn, items);
        return;
    }
    let text = format!("💰 What do you want to sell?\n💰 Your gold: {}", turn.player.gold);
    *turn.mode = Conversation::Shop(ShopState {
        items,
        view: ShopView::Selling,
    });
    turn.show(Reply::text(text).with_keyboard(Keyboard::grid(labels, 2).with_row([BTN_BACK])));
}

fn confirm(turn: &mut Turn<'_>, items: Vec<String>, item_id: &str, view: ShopView) {
    let content = turn.content;
    let Some(item) = content.items.get(item_id) else {
        show_shop_menu(turn, items);
        return;
    };
    let (question, button) = match &view {
        ShopView::ConfirmSell(_) => (format!("Sell for {} gold?", item.sell_price()), BTN_CONFIRM_SELL),
        _ => (format!("Buy for {} gold?", item.price), BTN_CONFIRM_BUY),
    };
    let caption = format!("{}\n\n{}", item_details(item), question);
    *turn.mode = Conversation::Shop(ShopState { items, view });
    turn.show(Reply::photo(item.image.as_deref(), caption).with_keyboard(Keyboard::column([button, BTN_BACK])));
}

pub(super) fn handle_shop(turn: &mut Turn<'_>, text: &str) -> bool {
    let Conversation::Shop(state) = &*turn.mode else {
        return false;
    };
    let ShopState { items, view } = state.clone();
    let content = turn.content;

    match view {
        ShopView::Buying => {
            if text == BTN_BACK {
                world::show_here(turn);
            } else if text == BTN_SELL_ITEMS {
                show_sell_menu(turn, items);
            } else {
                let chosen = items
                    .iter()
                    .find(|id| content.items.get(id.as_str()).is_some_and(|item| buy_label(item) == text))
                    .cloned();
                match chosen {
                    Some(item_id) => confirm(turn, items, &item_id, ShopView::ConfirmBuy(item_id.clone())),
                    None => return false,
                }
            }
        }
        ShopView::ConfirmBuy(item_id) => {
            if text == BTN_CONFIRM_BUY {
                buy(turn, &item_id);
            }
            show_shop_menu(turn, items);
        }
        ShopView::Selling => {
            if text == BTN_BACK {
                show_shop_menu(turn, items);
            } else {
                let chosen = sellable(turn)
                    .find(|(_, item, count)| sell_label(item, *count) == text)
                    .map(|(id, _, _)| id.clone());
                match chosen {
                    Some(item_id) => confirm(turn, items, &item_id, ShopView::ConfirmSell(item_id.clone())),
                    None => return false,
                }
            }
        }
        ShopView::ConfirmSell(item_id) => {
            if text == BTN_CONFIRM_SELL {
                sell(turn, &item_id);
            }
            show_sell_menu(turn, items);
        }
    }
    true
}

fn buy(turn: &mut Turn<'_>, item_id: &str) {
    let content = turn.content;
    let Some(item) = content.items.get(item_id) else {
        return;
    };
    let player = &mut *turn.player;
    if player.gold < item.price {
        let message = format!("❌ Not enough gold! Need {}, you have {}.", item.price, player.gold);
        turn.say(message);
        return;
    }
    player.gold -= item.price;
    player.add_item(item_id);
    let message = format!("✅ Bought {} for {} gold. Gold left: {}", item.name, item.price, player.gold);
    turn.say(message);
    turn.force_save();
}

fn sell(turn: &mut Turn<'_>, item_id: &str) {
    let content = turn.content;
    let Some(item) = content.items.get(item_id) else {
        return;
    };
    let player = &mut *turn.player;
    if player.equipped_artifacts.contains(item_id) && player.item_count(item_id) <= 1 {
        turn.say(format!("❌ Unequip {} before selling it.", item.name));
        return;
    }
    if !player.remove_item(item_id) {
        turn.say("❌ You don't have this item.");
        return;
    }
    let price = item.sell_price();
    player.gold += price;
    let message = format!("💰 Sold {} for {} gold. Gold: {}", item.name, price, player.gold);
    turn.say(message);
    turn.force_save();
}
