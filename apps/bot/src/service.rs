//! Bot service: wires the history store, rate aggregator, notifier and
//! Telegram dispatcher together and runs them until shutdown.

use crate::config::{AppConfig, ConfigError};
use chrono::Utc;
use ratewatch_alerts::{BotContext, NotificationSink, Notifier, TelegramBot};
use ratewatch_feeds::{FeedError, RateAggregator, RateItClient, RateItConfig};
use ratewatch_history::HistoryStore;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Period of cache maintenance and notifier checks.
pub const TICK_PERIOD: Duration = Duration::from_secs(60);

/// How long running tasks get to stop before they are aborted.
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("unable to create rateit client: {0}")]
    RateSource(#[from] FeedError),
}

pub struct Service {
    bot: Arc<TelegramBot>,
    notifier: Notifier,
    aggregator: RateAggregator,
}

impl Service {
    pub fn new(config: &AppConfig) -> Result<Self, ServiceError> {
        let token = config.api_key()?;

        let client = RateItClient::new(
            RateItConfig::default().with_upstream(config.rate_it.upstream.as_str()),
        )?;
        let aggregator = RateAggregator::new(Arc::new(client));

        let history = Arc::new(HistoryStore::new(
            config.history.storage_file.clone(),
            config.limits.history.overall,
        ));
        if history.path().is_none() {
            warn!("No history storage file configured, history commands will report no data");
        }

        let bot = Arc::new(TelegramBot::new(
            token,
            BotContext {
                aggregator: aggregator.clone(),
                history: Arc::clone(&history),
                exchanges: config.exchanges.clone(),
                limits: config.limits.history,
            },
        ));

        let sink: Arc<dyn NotificationSink> = bot.clone();
        let notifier = Notifier::new(
            history,
            sink,
            config.notifier.notifications.clone(),
            config.check_period(),
        );

        Ok(Self {
            bot,
            notifier,
            aggregator,
        })
    }

    /// Run until SIGINT/SIGTERM, then stop every task within
    /// [`SHUTDOWN_TIMEOUT`].
    pub async fn run(self) {
        let (stop_tx, stop_rx) = watch::channel(false);

        let dispatcher = tokio::spawn(Arc::clone(&self.bot).run(stop_rx.clone()));
        let ticker = tokio::spawn(run_ticker(self.notifier, self.aggregator, stop_rx));

        info!("Service started");
        shutdown_signal().await;
        warn!("Shutdown signal received");

        let _ = stop_tx.send(true);
        let aborted = stop_within(
            vec![("ticker", ticker), ("dispatcher", dispatcher)],
            SHUTDOWN_TIMEOUT,
        )
        .await;
        info!(aborted = aborted, "Service stopped");
    }
}

async fn run_ticker(
    mut notifier: Notifier,
    aggregator: RateAggregator,
    mut stop: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(TICK_PERIOD);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let purged = aggregator.purge_expired();
                if purged > 0 {
                    debug!(purged = purged, "Purged expired rates");
                }
                notifier.tick(Utc::now()).await;
            }
            _ = stop.changed() => break,
        }
    }

    info!("Ticker stopped");
}

/// Wait for every task until `timeout` runs out, then abort the rest.
/// Returns how many tasks were aborted.
async fn stop_within(handles: Vec<(&'static str, JoinHandle<()>)>, timeout: Duration) -> usize {
    let deadline = tokio::time::Instant::now() + timeout;
    let mut aborted = 0;
    for (name, mut handle) in handles {
        match tokio::time::timeout_at(deadline, &mut handle).await {
            Ok(Ok(())) => debug!(task = name, "Task stopped"),
            Ok(Err(e)) => error!(task = name, error = %e, "Task failed"),
            Err(_) => {
                warn!(task = name, "Shutdown timed out, aborting task");
                handle.abort();
                aborted += 1;
            }
        }
    }
    aborted
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Unable to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Unable to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
