//! Item definitions.

use serde::{Deserialize, Serialize};
use crate::StatBlock;

/// Item types
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    /// Used up on use: heals by `stats.health` and/or applies `buffs`
    #[default]
    Consumable,
    /// Equippable into an artifact slot, `stats` count while equipped
    Artifact,
    Material,
    Quest,
}

/// Item definition
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ItemDef {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type", default)]
    pub item_type: ItemType,
    #[serde(default)]
    pub price: u64,
    #[serde(default)]
    pub stats: StatBlock,
    #[serde(default)]
    pub buffs: Option<BuffDef>,
    #[serde(default)]
    pub image: Option<String>,
}

/// Timed stat bonus granted by a consumable
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuffDef {
    #[serde(flatten)]
    pub stats: StatBlock,
    #[serde(default = "default_buff_duration")]
    pub duration: u32,
}

fn default_buff_duration() -> u32 {
    1
}

impl ItemDef {
    pub fn is_consumable(&self) -> bool {
        self.item_type == ItemType::Consumable
    }

    pub fn is_artifact(&self) -> bool {
        self.item_type == ItemType::Artifact
    }

    /// Health restored when consumed
    pub fn heal_amount(&self) -> i64 {
        if self.is_consumable() {
            self.stats.health.max(0)
        } else {
            0
        }
    }

    /// Gold paid by a shop when the player sells this item
    pub fn sell_price(&self) -> u64 {
        (self.price / 2).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_consumable_with_buff() {
        let item: ItemDef = serde_json::from_str(
            r#"{"name": "Rage Draught", "type": "consumable", "price": 30,
                "stats": {"health": 20}, "buffs": {"attack": 5, "duration": 3}}"#,
        )
        .unwrap();

        assert!(item.is_consumable());
        assert_eq!(item.heal_amount(), 20);
        let buff = item.buffs.unwrap();
        assert_eq!(buff.stats, StatBlock::new(0, 5, 0));
        assert_eq!(buff.duration, 3);
    }

    #[test]
    fn test_sell_price_never_below_one() {
        let cheap = ItemDef { price: 1, ..Default::default() };
        let pricey = ItemDef { price: 51, ..Default::default() };
        assert_eq!(cheap.sell_price(), 1);
        assert_eq!(pricey.sell_price(), 25);
    }
}
