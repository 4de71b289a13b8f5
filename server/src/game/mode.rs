//! Where a player is in the conversation.

use crate::battle::BattleSession;

/// The current screen decides how the next message is read
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Conversation {
    /// Standing at a location, its actions and the global buttons apply
    #[default]
    Idle,
    ClassSelection {
        selected: Option<String>,
    },
    Battle(Box<BattleState>),
    Story(StoryCursor),
    RandomEvent {
        /// Set while a chained event is playing
        chain: Option<ChainCursor>,
    },
    Inventory {
        viewing: Option<String>,
    },
    Shop(ShopState),
    Teleport,
    Stats,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BattleState {
    pub session: BattleSession,
    pub origin: BattleOrigin,
    pub potion_menu: bool,
}

/// What to resume after a won battle
#[derive(Debug, Clone, PartialEq)]
pub enum BattleOrigin {
    Location,
    Story(StoryCursor),
    RandomEvent(ChainCursor),
}

/// Scene currently shown in a city's storyline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoryCursor {
    pub city: String,
    pub scene: String,
}

/// Position inside a chained random event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainCursor {
    pub city: String,
    /// Index of the event in the city's pool
    pub event: usize,
    /// Next scene to play
    pub next: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShopState {
    /// Item ids on sale here
    pub items: Vec<String>,
    pub view: ShopView,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShopView {
    Buying,
    ConfirmBuy(String),
    Selling,
    ConfirmSell(String),
}
