//! Chat transport.

pub mod telegram;

pub use telegram::{run_outbox, run_polling, TelegramClient};
