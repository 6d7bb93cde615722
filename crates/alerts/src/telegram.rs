//! Telegram bot handlers.

use crate::config::HistoryLimits;
use crate::error::AlertError;
use crate::notifier::{read_entries, NotificationSink};
use async_trait::async_trait;
use ratewatch_core::{render_chart, render_log, render_rates, Exchange};
use ratewatch_feeds::RateAggregator;
use ratewatch_history::HistoryStore;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::ParseMode;
use teloxide::utils::command::BotCommands;
use teloxide::utils::html;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Entries behind `/rawhistory`.
pub const RAW_HISTORY_LIMIT: usize = 24;

/// Sparkline width of history charts, in columns.
pub const CHART_WIDTH: usize = 32;

const GREETING: &str = "Nice to see you, type /history to get exchange rates history ;)";
const PLEASE_WAIT: &str = "I'll check exchange rates...please be patient...";
const NO_HISTORY: &str = "Sorry, history is unavailable so far";
const UNSUPPORTED: &str = "Sorry, unsupported command";

const IDLE_SHUTDOWN_RETRIES: usize = 50;
const IDLE_SHUTDOWN_BACKOFF: std::time::Duration = std::time::Duration::from_millis(100);

/// Bot commands.
#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "lowercase", description = "Available commands:")]
pub enum Command {
    #[command(description = "Say hello")]
    Start,
    #[command(description = "Show the ID of this chat")]
    ChatId,
    #[command(description = "Show current exchange rates")]
    Rates,
    #[command(description = "Show recent exchange rates history")]
    History,
    #[command(description = "Show long exchange rates history")]
    LongHistory,
    #[command(description = "Show recent history log")]
    RawHistory,
    #[command(description = "Show help")]
    Help,
}

/// Everything the command handlers read from.
pub struct BotContext {
    pub aggregator: RateAggregator,
    pub history: Arc<HistoryStore>,
    pub exchanges: Vec<Exchange>,
    pub limits: HistoryLimits,
}

/// Builds command replies as Telegram HTML.
pub struct Responder {
    ctx: BotContext,
}

impl Responder {
    pub fn new(ctx: BotContext) -> Self {
        Self { ctx }
    }

    pub fn chat_id(&self, chat_id: ChatId) -> String {
        format!("chat id: {}", html::code_inline(&chat_id.0.to_string()))
    }

    pub async fn rates(&self) -> String {
        let rates = self.ctx.aggregator.fetch_all(&self.ctx.exchanges).await;
        html::code_block(&render_rates(&rates))
    }

    /// Chart over the last `limit` entries.
    pub async fn history_chart(&self, limit: usize) -> String {
        let entries = match read_entries(&self.ctx.history, limit).await {
            Ok(entries) => entries,
            Err(e) => return failure(e),
        };

        match render_chart(&entries, CHART_WIDTH) {
            Some(chart) => format!(
                "{}\n{}",
                html::code_inline(&chart.caption()),
                html::code_block(&chart.body)
            ),
            None => NO_HISTORY.to_string(),
        }
    }

    pub async fn raw_history(&self) -> String {
        match read_entries(&self.ctx.history, RAW_HISTORY_LIMIT).await {
            Ok(entries) if entries.is_empty() => NO_HISTORY.to_string(),
            Ok(entries) => html::code_block(&render_log(&entries)),
            Err(e) => failure(e),
        }
    }

    pub fn limits(&self) -> HistoryLimits {
        self.ctx.limits
    }
}

fn failure(err: AlertError) -> String {
    error!(error = %err, "Failed to build reply");
    html::escape(&format!("ooops, shit happens: {}", err))
}

/// Telegram bot wrapper.
pub struct TelegramBot {
    bot: Bot,
    responder: Responder,
}

impl TelegramBot {
    /// Create a new bot with the given token.
    pub fn new(token: &str, ctx: BotContext) -> Self {
        Self {
            bot: Bot::new(token),
            responder: Responder::new(ctx),
        }
    }

    /// Run the command dispatcher until `shutdown` flips.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        if *shutdown.borrow() {
            return;
        }
        if let Err(e) = self.bot.set_my_commands(Command::bot_commands()).await {
            warn!(error = %e, "Unable to register bot commands");
        }

        let bot = self.bot.clone();
        let on_command = Arc::clone(&self);
        let on_other = Arc::clone(&self);
        let handler = Update::filter_message()
            .filter(|msg: Message| msg.chat.is_private())
            .branch(dptree::entry().filter_command::<Command>().endpoint(
                move |bot: Bot, msg: Message, cmd: Command| {
                    let this = Arc::clone(&on_command);
                    async move { this.handle_command(bot, msg.chat.id, cmd).await }
                },
            ))
            .branch(dptree::endpoint(move |bot: Bot, msg: Message| {
                let this = Arc::clone(&on_other);
                async move { this.reply(&bot, msg.chat.id, UNSUPPORTED).await }
            }));

        let mut dispatcher = Dispatcher::builder(bot, handler)
            .default_handler(|_| async {})
            .build();

        // Stop may have been requested while the commands were registered.
        if *shutdown.borrow_and_update() {
            info!("Telegram dispatcher not started, shutting down");
            return;
        }

        let token = dispatcher.shutdown_token();
        tokio::spawn(async move {
            if shutdown.changed().await.is_err() {
                return;
            }
            // The dispatcher may still be starting up.
            for _ in 0..IDLE_SHUTDOWN_RETRIES {
                match token.shutdown() {
                    Ok(stopped) => return stopped.await,
                    Err(_) => tokio::time::sleep(IDLE_SHUTDOWN_BACKOFF).await,
                }
            }
            warn!("Dispatcher was not running");
        });

        info!("Telegram dispatcher started");
        dispatcher.dispatch().await;
        info!("Telegram dispatcher stopped");
    }

    async fn handle_command(
        &self,
        bot: Bot,
        chat_id: ChatId,
        cmd: Command,
    ) -> Result<(), AlertError> {
        let reply = match cmd {
            Command::Start => html::escape(GREETING),
            Command::ChatId => self.responder.chat_id(chat_id),
            Command::Rates => {
                // best effort, the rates follow either way
                let _ = self.reply(&bot, chat_id, PLEASE_WAIT).await;
                self.responder.rates().await
            }
            Command::History => {
                self.responder
                    .history_chart(self.responder.limits().short)
                    .await
            }
            Command::LongHistory => {
                self.responder
                    .history_chart(self.responder.limits().long)
                    .await
            }
            Command::RawHistory => self.responder.raw_history().await,
            Command::Help => html::escape(&Command::descriptions().to_string()),
        };

        self.reply(&bot, chat_id, &reply).await
    }

    async fn reply(&self, bot: &Bot, chat_id: ChatId, text: &str) -> Result<(), AlertError> {
        if let Err(e) = bot
            .send_message(chat_id, text)
            .parse_mode(ParseMode::Html)
            .await
        {
            error!(chat_id = chat_id.0, error = %e, "Unable to send reply");
            return Err(e.into());
        }
        Ok(())
    }
}

#[async_trait]
impl NotificationSink for TelegramBot {
    async fn send(&self, chat_id: i64, message: &str) -> Result<(), AlertError> {
        self.bot
            .send_message(ChatId(chat_id), html::escape(message))
            .parse_mode(ParseMode::Html)
            .await
            .map_err(|e| AlertError::delivery(chat_id, e))?;
        Ok(())
    }
}
