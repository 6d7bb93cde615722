//! Telegram alerts for exchange rates.
//!
//! This crate provides:
//! - Threshold rules with hysteresis
//! - The notifier that checks the newest history entry
//! - Telegram bot integration for commands and notifications

pub mod config;
pub mod error;
pub mod notification;
pub mod notifier;
pub mod telegram;

pub use config::{HistoryLimits, NotificationConfig};
pub use error::AlertError;
pub use notification::{compare_rate, Notification, COOLDOWN, RATE_EPSILON};
pub use notifier::{
    format_alert_message, NotificationSink, Notifier, ALERT_HEADER, DEFAULT_CHECK_PERIOD,
};
pub use telegram::{BotContext, Command, Responder, TelegramBot};
