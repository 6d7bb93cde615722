//! Alert configuration types.

use serde::{Deserialize, Serialize};

/// One notification rule: alert `chat_id` once a rate drops to `threshold`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Rate at or below which the rule fires.
    #[serde(alias = "rate")]
    pub threshold: f64,
    /// Telegram chat ID for notifications
    pub chat_id: i64,
}

impl NotificationConfig {
    pub fn new(threshold: f64, chat_id: i64) -> Self {
        Self { threshold, chat_id }
    }
}

/// How many history entries each view covers. `0` means the whole read
/// window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryLimits {
    /// Scan cap of the history store.
    pub overall: usize,
    /// Entries behind `/history`.
    pub short: usize,
    /// Entries behind `/longhistory`.
    pub long: usize,
}

impl Default for HistoryLimits {
    fn default() -> Self {
        Self {
            overall: 1000,
            short: 72,
            long: 0,
        }
    }
}
