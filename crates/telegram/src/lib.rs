//! Telegram-facing edge: inbound update parsing, webhook auth, replies.

pub mod auth;
pub mod format;
pub mod notify;
pub mod update;

pub use notify::{Notifier, NotifyError, TelegramNotifier};
pub use update::Update;
