//! Slash commands and the restart archive.

use std::path::{Path, PathBuf};

use serde::Serialize;
use std::collections::BTreeMap;

use crate::entities::PlayerRecord;

/// A slash command typed into the chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Restart,
    Save,
    Help,
    Unknown(String),
}

/// Parse a chat command.
/// Returns None if it's not a command (doesn't start with /)
pub fn parse(text: &str) -> Option<Command> {
    let rest = text.strip_prefix('/')?;

    // group chats send `/start@SomeBot`
    let word = rest.split_whitespace().next().unwrap_or("");
    let name = word.split('@').next().unwrap_or(word).to_lowercase();

    Some(match name.as_str() {
        "start" => Command::Start,
        "restart" => Command::Restart,
        "save" => Command::Save,
        "help" => Command::Help,
        _ => Command::Unknown(name),
    })
}

pub fn help_text() -> String {
    let mut help = String::from("Available commands:\n");
    help.push_str("  /start - Continue your adventure\n");
    help.push_str("  /save - Save your progress now\n");
    help.push_str("  /restart - Back up your hero and start over\n");
    help.push_str("  /help - Show this help message\n");
    help
}

// =============================================================================
// Restart Archive
// =============================================================================

#[derive(Debug, Serialize)]
struct RestartSnapshot<'a> {
    user_id: i64,
    class_name: Option<&'a str>,
    level: u32,
    gold: u64,
    inventory: &'a BTreeMap<String, u32>,
    timestamp: f64,
}

/// Write a snapshot of the record to `dir` before it is wiped.
/// Returns the path of the archive file.
pub async fn archive_snapshot(dir: &Path, record: &PlayerRecord, now: f64) -> std::io::Result<PathBuf> {
    let snapshot = RestartSnapshot {
        user_id: record.user_id,
        class_name: record.class_id.as_deref(),
        level: record.level,
        gold: record.gold,
        inventory: &record.inventory,
        timestamp: now,
    };
    let json = serde_json::to_vec_pretty(&snapshot)?;

    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(format!("player_{}_{}.json", record.user_id, now as i64));
    tokio::fs::write(&path, json).await?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse("/start"), Some(Command::Start));
        assert_eq!(parse("/Restart"), Some(Command::Restart));
        assert_eq!(parse("/save now"), Some(Command::Save));
        assert_eq!(parse("/start@RpgBot"), Some(Command::Start));
        assert_eq!(parse("/dance"), Some(Command::Unknown("dance".into())));
        assert_eq!(parse("/"), Some(Command::Unknown(String::new())));
        assert_eq!(parse("⚔️ Attack"), None);
        assert_eq!(parse("start"), None);
    }

    #[test]
    fn test_help_lists_every_command() {
        let help = help_text();
        for command in ["/start", "/save", "/restart", "/help"] {
            assert!(help.contains(command));
        }
    }

    #[tokio::test]
    async fn test_archive_snapshot_writes_json() {
        let dir = tempfile::tempdir().unwrap();
        let content = testing::content();
        let mut player = testing::warrior(&content);
        player.gold = 123;
        player.add_item("health_potion");

        let backups = dir.path().join("backups");
        let path = archive_snapshot(&backups, &player, 1_700_000_000.5).await.unwrap();
        assert_eq!(path, backups.join("player_42_1700000000.json"));

        let written: serde_json::Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(written["user_id"], 42);
        assert_eq!(written["class_name"], "warrior");
        assert_eq!(written["level"], 1);
        assert_eq!(written["gold"], 123);
        assert_eq!(written["inventory"]["health_potion"], 1);
        assert_eq!(written["timestamp"], 1_700_000_000.5);
    }
}
