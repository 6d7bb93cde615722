//! Error types for alert delivery and bot handlers.

use ratewatch_history::HistoryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AlertError {
    #[error("unable to deliver message to chat {chat_id}: {reason}")]
    Delivery { chat_id: i64, reason: String },
    #[error("Telegram API error: {0}")]
    Api(#[from] teloxide::RequestError),
    #[error("get entries: {0}")]
    History(#[from] HistoryError),
    #[error("history task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl AlertError {
    pub fn delivery(chat_id: i64, reason: impl ToString) -> Self {
        AlertError::Delivery {
            chat_id,
            reason: reason.to_string(),
        }
    }
}
