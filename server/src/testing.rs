//! Content fixture shared by unit tests.

use rpg_shared::Content;
use serde_json::{from_value, json};

use crate::entities::PlayerRecord;

pub fn content() -> Content {
    let mut bosses: std::collections::BTreeMap<String, rpg_shared::EnemyDef> = from_value(json!({
        "troll_king": {
            "name": "Troll King", "health": 5, "attack": 3, "experience": 300,
            "phases": [{"name": "Enraged Troll King", "health": 60, "attack": 6,
                        "resistances": {"physical": 0.0}, "message": "The Troll King roars!"}]
        }
    }))
    .unwrap();
    for boss in bosses.values_mut() {
        boss.is_boss = true;
    }

    let content = Content {
        classes: from_value(json!({
            "warrior": {
                "name": "Warrior", "description": "Steel and stubbornness.",
                "base_stats": {"health": 120, "attack": 10, "defense": 5},
                "starting_abilities": ["Power Strike", "Venom Blade", "Shield Wall", "Drain"],
                "unlocks": {"3": ["Whirlwind"]}
            },
            "mage": {
                "name": "Mage",
                "base_stats": {"health": 80, "attack": 14, "defense": 2},
                "starting_abilities": ["Drain"]
            }
        }))
        .unwrap(),
        abilities: from_value(json!({
            "Power Strike": {"layers": [{"mult": 1.5, "type": "physical"}], "max_uses": 2},
            "Venom Blade": {"dot": {"name": "Venom", "type": "poison", "mult": 0.5, "duration": 3}},
            "Shield Wall": {"defense_buff": 5, "max_uses": 1},
            "Drain": {"layers": [{"mult": 1.0, "type": "dark"}], "heal": 0.5},
            "Whirlwind": {"dmg_mult": 1.2}
        }))
        .unwrap(),
        items: from_value(json!({
            "health_potion": {"name": "Health Potion", "type": "consumable", "price": 20, "stats": {"health": 50}},
            "rage_draught": {"name": "Rage Draught", "type": "consumable", "price": 30,
                             "buffs": {"attack": 5, "duration": 2}},
            "iron_amulet": {"name": "Iron Amulet", "type": "artifact", "price": 40, "stats": {"defense": 3}},
            "wolf_pelt": {"name": "Wolf Pelt", "type": "material", "price": 9}
        }))
        .unwrap(),
        enemies: from_value(json!({
            "training_dummy": {"name": "Training Dummy", "health": 30, "attack": 1, "experience": 50},
            "wolf": {"name": "Wolf", "health": 20, "attack": 8, "experience": 25, "resistances": {"poison": 0.5}},
            "ogre": {"name": "Ogre", "health": 500, "attack": 1000, "experience": 0}
        }))
        .unwrap(),
        bosses,
        locations: from_value(json!({
            "village_square": {
                "name": "Village Square", "description": "A quiet square.", "is_city": true,
                "actions": [
                    {"text": "📜 Village elder", "type": "quest", "target": "first_steps"},
                    {"text": "⚔️ Training ground", "type": "battle", "target": "training_dummy"},
                    {"text": "🌲 Dark forest", "type": "location", "target": "dark_forest"},
                    {"text": "🏪 Trader", "type": "shop", "shop_items": ["health_potion", "iron_amulet"]},
                    {"text": "📖 Village story", "type": "story", "target": "village_square"},
                    {"text": "🎲 Wander around", "type": "random_events", "target": "village_square"},
                    {"text": "🏰 Capital road", "type": "location", "target": "capital_city"},
                    {"text": "👹 Troll bridge", "type": "battle", "target": "troll_king", "required_level": 5}
                ]
            },
            "dark_forest": {
                "name": "Dark Forest",
                "actions": [{"text": "🐺 Hunt wolves", "type": "battle", "target": "wolf"}]
            },
            "capital_city": {"name": "Capital City", "is_city": true, "locked": true},
            "player_camp": {"name": "Camp", "description": "You rest by the fire."}
        }))
        .unwrap(),
        quests: from_value(json!({
            "first_steps": {
                "name": "First Steps", "description": "Beat the training dummy.",
                "objectives": {"training_dummy": 1},
                "rewards": {"experience": 50, "gold": 20, "items": ["health_potion"]}
            },
            "wolf_hunt": {
                "name": "Wolf Hunt", "objectives": {"wolf": 2},
                "rewards": {"gold": 40},
                "requirements": {"level": 2, "completed_quest": "first_steps"}
            }
        }))
        .unwrap(),
        stories: from_value(json!({
            "village_square": [
                {"id": "v1", "type": "dialogue", "title": "A stranger", "text": "Bandits near the road.", "next_scene": "v2"},
                {"id": "v2", "type": "battle", "text": "A bandit attacks!", "enemy": "training_dummy", "next_scene": "v3"},
                {"id": "v3", "type": "location", "text": "The road to the capital is open.",
                 "target": "capital_city", "unlock_city": "capital_city", "rewards": {"gold": 10}}
            ]
        }))
        .unwrap(),
        random_events: from_value(json!({
            "village_square": [
                {"name": "Lucky find", "type": "reward", "fatigue_cost": 10, "rewards": {"gold": 5}},
                {"name": "Ambush", "type": "chain", "fatigue_cost": 30, "scenes": [
                    {"type": "dialogue", "text": "Something moves in the bushes."},
                    {"type": "battle", "text": "A wolf jumps out!", "enemy": "wolf"},
                    {"type": "reward", "text": "You find a pelt.", "rewards": {"items": ["wolf_pelt"]}}
                ]}
            ]
        }))
        .unwrap(),
    };
    content.validate().unwrap();
    content
}

/// Level 1 warrior standing in the village square
pub fn warrior(content: &Content) -> PlayerRecord {
    let mut player = PlayerRecord::new(42, 0.0);
    player.choose_class("warrior", &content.classes["warrior"]);
    player.location = "village_square".into();
    player
}
