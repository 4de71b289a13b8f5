//! Chat protocol between the game and the transport.
//!
//! The game answers every inbound command with one or more [`Reply`] screens.
//! Buttons are plain labels; pressing one sends its label back as text.

/// Image shown when content does not provide one
pub const DEFAULT_IMAGE: &str = "https://i.imgur.com/4M34hi2.png";

// =============================================================================
// Button Labels
// =============================================================================

pub const BTN_ATTACK: &str = "⚔️ Attack";
pub const BTN_POTIONS: &str = "🧪 Potions";
pub const BTN_FLEE: &str = "🏃 Flee";
pub const BTN_BACK: &str = "⬅️ Back";
pub const BTN_CONTINUE: &str = "➡️ Continue";
pub const BTN_RETURN_TO_CITY: &str = "🏠 Return to city";
pub const BTN_TO_CITY: &str = "🏙️ To city";
pub const BTN_STATS: &str = "📊 Stats";
pub const BTN_INVENTORY: &str = "🎒 Inventory";
pub const BTN_TELEPORT: &str = "🌀 Teleport";
pub const BTN_SAVE: &str = "💾 Save";
pub const BTN_ANOTHER_EVENT: &str = "🎲 Another event";
pub const BTN_CHOOSE_CLASS: &str = "✅ Choose this class";
pub const BTN_BACK_TO_CLASSES: &str = "⬅️ Back to classes";
pub const BTN_USE: &str = "🖐 Use";
pub const BTN_EQUIP: &str = "🛡️ Equip";
pub const BTN_UNEQUIP: &str = "🔻 Unequip";
pub const BTN_SELL_ITEMS: &str = "💰 Sell items";
pub const BTN_CONFIRM_BUY: &str = "✅ Buy";
pub const BTN_CONFIRM_SELL: &str = "✅ Sell";

/// Prefix of an ability button in battle
pub const ABILITY_PREFIX: &str = "🔮 ";
/// Prefix of a potion button in the battle potion menu
pub const POTION_PREFIX: &str = "🍺 ";
/// Prefix of a class button on the class selection screen
pub const CLASS_PREFIX: &str = "👁️ ";
/// Prefix of a destination button in the teleport menu
pub const TELEPORT_PREFIX: &str = "📍 ";

// =============================================================================
// Screens
// =============================================================================

/// Reply keyboard attached to a screen
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Keyboard {
    Buttons(Vec<Vec<String>>),
    Remove,
}

impl Keyboard {
    /// Lay labels out row by row, `columns` per row
    pub fn grid<I, S>(labels: I, columns: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        let rows = labels.chunks(columns.max(1)).map(|row| row.to_vec()).collect();
        Keyboard::Buttons(rows)
    }

    pub fn column<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::grid(labels, 1)
    }

    /// Append a full-width row
    pub fn with_row<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let row: Vec<String> = labels.into_iter().map(Into::into).collect();
        if let Keyboard::Buttons(rows) = &mut self {
            if !row.is_empty() {
                rows.push(row);
            }
        }
        self
    }

    /// Every label on the keyboard, in reading order
    pub fn labels(&self) -> Vec<&str> {
        match self {
            Keyboard::Buttons(rows) => rows.iter().flatten().map(String::as_str).collect(),
            Keyboard::Remove => Vec::new(),
        }
    }
}

/// One outbound screen
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Text {
        text: String,
        keyboard: Option<Keyboard>,
    },
    Photo {
        image: String,
        caption: String,
        keyboard: Option<Keyboard>,
    },
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Reply::Text { text: text.into(), keyboard: None }
    }

    /// Photo screen, falling back to [`DEFAULT_IMAGE`]
    pub fn photo(image: Option<&str>, caption: impl Into<String>) -> Self {
        Reply::Photo {
            image: image.unwrap_or(DEFAULT_IMAGE).to_string(),
            caption: caption.into(),
            keyboard: None,
        }
    }

    pub fn with_keyboard(mut self, new_keyboard: Keyboard) -> Self {
        match &mut self {
            Reply::Text { keyboard, .. } | Reply::Photo { keyboard, .. } => *keyboard = Some(new_keyboard),
        }
        self
    }

    /// Text or caption
    pub fn body(&self) -> &str {
        match self {
            Reply::Text { text, .. } => text,
            Reply::Photo { caption, .. } => caption,
        }
    }

    pub fn keyboard(&self) -> Option<&Keyboard> {
        match self {
            Reply::Text { keyboard, .. } | Reply::Photo { keyboard, .. } => keyboard.as_ref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_layout() {
        let keyboard = Keyboard::grid(["a", "b", "c"], 2).with_row([BTN_BACK]);
        assert_eq!(
            keyboard,
            Keyboard::Buttons(vec![
                vec!["a".to_string(), "b".to_string()],
                vec!["c".to_string()],
                vec![BTN_BACK.to_string()],
            ])
        );
        assert_eq!(keyboard.labels(), vec!["a", "b", "c", BTN_BACK]);
    }

    #[test]
    fn test_photo_falls_back_to_default_image() {
        let reply = Reply::photo(None, "hello").with_keyboard(Keyboard::Remove);
        match &reply {
            Reply::Photo { image, .. } => assert_eq!(image, DEFAULT_IMAGE),
            Reply::Text { .. } => panic!("expected photo"),
        }
        assert_eq!(reply.body(), "hello");
        assert_eq!(reply.keyboard(), Some(&Keyboard::Remove));
    }
}
