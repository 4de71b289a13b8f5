//! Conversation handling.
//!
//! Every inbound chat message becomes one [`Turn`]: the player's session is
//! locked, the message is dispatched on the current [`Conversation`] mode,
//! the resulting screens are queued on the outbox and the record is saved
//! (debounced unless the turn asked for a forced write).

mod battle;
mod events;
mod inventory;
mod mode;
mod world;


pub use mode::Conversation;

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use log::{error, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rpg_shared::{
    Content, Keyboard, Reply, BTN_BACK, BTN_INVENTORY, BTN_RETURN_TO_CITY, BTN_SAVE, BTN_STATS,
    BTN_TELEPORT, BTN_TO_CITY,
};
use tokio::sync::mpsc;

use crate::commands::{self, Command};
use crate::entities::{now_secs, PlayerRecord};
use crate::persistence::{Database, PlayerCache, Session};

/// Runtime knobs of the game loop
#[derive(Debug, Clone)]
pub struct GameSettings {
    /// Minimum gap between two non-forced saves of a player
    pub save_debounce: Duration,
    /// Mandatory rest at the camp after a defeat
    pub defeat_rest: Duration,
    /// Where restart snapshots are archived
    pub backup_dir: PathBuf,
}

/// A text message from a player
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub user_id: i64,
    pub chat_id: i64,
    pub text: String,
}

/// A screen on its way to a chat
#[derive(Debug, Clone, PartialEq)]
pub struct Outgoing {
    pub chat_id: i64,
    pub reply: Reply,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SaveKind {
    Debounced,
    Forced,
    /// Forced, and the player is told whether it worked
    Announced,
}

/// Work left after the replies of a turn went out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FollowUp {
    /// Wait out the defeat rest, then send the player back
    Rest,
}

/// One message being handled against one player
pub(crate) struct Turn<'a> {
    content: &'a Content,
    player: &'a mut PlayerRecord,
    mode: &'a mut Conversation,
    rng: &'a mut StdRng,
    /// Unix seconds at the start of the turn
    now: f64,
    defeat_rest: Duration,
    replies: Vec<Reply>,
    save: SaveKind,
    follow_up: Option<FollowUp>,
}

impl Turn<'_> {
    fn say(&mut self, text: impl Into<String>) {
        self.replies.push(Reply::text(text));
    }

    fn show(&mut self, reply: Reply) {
        self.replies.push(reply);
    }

    fn force_save(&mut self) {
        if self.save == SaveKind::Debounced {
            self.save = SaveKind::Forced;
        }
    }
}

struct TurnResult {
    replies: Vec<Reply>,
    save: SaveKind,
    follow_up: Option<FollowUp>,
}

pub struct Game {
    content: Arc<Content>,
    db: Database,
    cache: Arc<PlayerCache>,
    outbox: mpsc::UnboundedSender<Outgoing>,
    settings: GameSettings,
    rng: Mutex<StdRng>,
}

impl Game {
    pub fn new(
        content: Arc<Content>,
        db: Database,
        cache: Arc<PlayerCache>,
        outbox: mpsc::UnboundedSender<Outgoing>,
        settings: GameSettings,
    ) -> Self {
        Self {
            content,
            db,
            cache,
            outbox,
            settings,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Replace the random source, for reproducible battles
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = Mutex::new(rng);
        self
    }

    /// Handle one message. Never fails: problems are logged and the
    /// player may simply get no answer.
    pub async fn handle_message(&self, message: InboundMessage) {
        let shared = match self.cache.get_or_create(message.user_id, &self.db).await {
            Ok(session) => session,
            Err(e) => {
                error!("Could not load player {}: {}", message.user_id, e);
                return;
            }
        };
        let mut session = shared.lock().await;
        let text = message.text.trim();

        if commands::parse(text) == Some(Command::Restart) {
            let replies = self.restart(&mut session).await;
            self.send(message.chat_id, replies);
            return;
        }

        let result = self.run_turn(&mut session, |turn| dispatch(turn, text));
        let mut replies = result.replies;
        let saved = session
            .save(&self.db, result.save != SaveKind::Debounced, self.settings.save_debounce)
            .await;
        if result.save == SaveKind::Announced {
            replies.push(save_reply(saved));
        }
        self.send(message.chat_id, replies);

        if result.follow_up == Some(FollowUp::Rest) {
            drop(session);
            tokio::time::sleep(self.settings.defeat_rest).await;

            let mut session = shared.lock().await;
            // a message after the rest or a restart may have moved them already
            if session.record.is_resting() {
                let result = self.run_turn(&mut session, world::finish_rest);
                session.save(&self.db, true, self.settings.save_debounce).await;
                self.send(message.chat_id, result.replies);
            }
        }
    }

    fn run_turn(&self, session: &mut Session, play: impl FnOnce(&mut Turn<'_>)) -> TurnResult {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        let Session { record, mode, .. } = session;
        let mut turn = Turn {
            content: &self.content,
            player: record,
            mode,
            rng: &mut *rng,
            now: now_secs(),
            defeat_rest: self.settings.defeat_rest,
            replies: Vec::new(),
            save: SaveKind::Debounced,
            follow_up: None,
        };
        play(&mut turn);
        TurnResult {
            replies: turn.replies,
            save: turn.save,
            follow_up: turn.follow_up,
        }
    }

    /// Archive the old record, wipe the store rows and start over
    async fn restart(&self, session: &mut Session) -> Vec<Reply> {
        let user_id = session.record.user_id;
        match commands::archive_snapshot(&self.settings.backup_dir, &session.record, now_secs()).await {
            Ok(path) => info!("Archived player {} to {}", user_id, path.display()),
            Err(e) => {
                error!("Could not archive player {} before restart: {}", user_id, e);
                return vec![Reply::text("❌ Could not back up your progress, restart cancelled.")];
            }
        }
        if let Err(e) = self.db.reset_player(user_id).await {
            error!("Could not reset player {}: {}", user_id, e);
            return vec![Reply::text("❌ Restart failed. Please try again later.")];
        }

        *session = Session::new(PlayerRecord::new(user_id, now_secs()));
        let result = self.run_turn(session, |turn| {
            turn.show(
                Reply::text("🔄 Game restarted!\n\nYour previous progress was backed up.\nA new adventure begins...")
                    .with_keyboard(Keyboard::Remove),
            );
            world::show_class_selection(turn);
        });
        session.save(&self.db, true, self.settings.save_debounce).await;
        result.replies
    }

    fn send(&self, chat_id: i64, replies: Vec<Reply>) {
        for reply in replies {
            if self.outbox.send(Outgoing { chat_id, reply }).is_err() {
                warn!("Outbox closed, dropping replies for chat {}", chat_id);
                return;
            }
        }
    }
}

fn save_reply(saved: bool) -> Reply {
    if saved {
        Reply::text("💾 Progress saved!")
    } else {
        Reply::text("❌ Could not save your progress. Please try again later.")
    }
}

/// Route a message to whatever owns the current screen
fn dispatch(turn: &mut Turn<'_>, text: &str) {
    if turn.player.is_resting() {
        world::check_rest(turn);
        return;
    }

    match commands::parse(text) {
        Some(Command::Start) => {
            world::welcome(turn);
            return;
        }
        Some(Command::Save) => {
            turn.save = SaveKind::Announced;
            return;
        }
        Some(Command::Help) => {
            turn.say(commands::help_text());
            return;
        }
        Some(Command::Unknown(name)) => {
            turn.say(format!("❓ Unknown command /{}", name));
            return;
        }
        // handled before the turn starts
        Some(Command::Restart) => return,
        None => {}
    }

    if text == BTN_SAVE {
        turn.save = SaveKind::Announced;
        return;
    }

    if turn.player.class_id.is_none() {
        world::handle_class_selection(turn, text);
        return;
    }

    let handled = match turn.mode {
        Conversation::Battle(_) => battle::handle(turn, text),
        Conversation::Story(_) => world::handle_story(turn, text),
        Conversation::RandomEvent { .. } => events::handle(turn, text),
        Conversation::Inventory { .. } => inventory::handle_inventory(turn, text),
        Conversation::Shop(_) => inventory::handle_shop(turn, text),
        Conversation::Teleport => world::handle_teleport(turn, text),
        Conversation::Stats => world::handle_stats(turn, text),
        Conversation::Idle | Conversation::ClassSelection { .. } => false,
    };
    if handled {
        return;
    }

    match text {
        BTN_STATS => world::show_stats(turn),
        BTN_INVENTORY => inventory::show_inventory(turn),
        BTN_TELEPORT => world::show_teleport(turn),
        BTN_BACK => world::show_here(turn),
        BTN_TO_CITY | BTN_RETURN_TO_CITY => {
            let city = turn.player.current_city.clone();
            world::show_location(turn, &city);
        }
        _ => {
            if !world::handle_location_action(turn, text) {
                world::show_here(turn);
            }
        }
    }
}
