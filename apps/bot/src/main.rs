//! ratewatch - exchange rate history and alerts bot.

mod config;
mod service;

use clap::{Parser, Subcommand, ValueEnum};
use crate::config::AppConfig;
use ratewatch_core::{render_chart, render_log};
use ratewatch_history::{HistoryError, HistoryStore};
use service::Service;
use std::path::PathBuf;
use std::process::ExitCode;
use thiserror::Error;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

/// Sparkline width of charts printed by `history`.
const TERMINAL_CHART_WIDTH: usize = 96;

/// ratewatch CLI
#[derive(Parser, Debug)]
#[command(name = "ratewatch")]
#[command(about = "Exchange rate history and Telegram alerts", long_about = None)]
struct Args {
    /// Configuration file, may be repeated; later files override earlier ones
    #[arg(short, long, global = true)]
    config: Vec<PathBuf>,

    /// Log level: trace, debug, info, warn, error
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the Telegram bot
    Start,
    /// Render a history log without starting the bot
    History {
        /// History file
        #[arg(long)]
        file: PathBuf,

        /// Output kind
        #[arg(long, value_enum, default_value_t = Kind::Chart)]
        kind: Kind,

        /// Lines read from the end of the file
        #[arg(long, default_value_t = 192)]
        limit: usize,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Kind {
    Log,
    Chart,
}

fn init_logging(level: &str) {
    let level = match level {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

fn log_level(args: &Args, config: &AppConfig) -> String {
    match &args.log_level {
        Some(level) => level.clone(),
        None if config.debug => "debug".to_string(),
        None => "info".to_string(),
    }
}

#[derive(Error, Debug)]
enum RenderError {
    #[error("read history: {0}")]
    Read(#[from] HistoryError),
    #[error("render failed: no entries to plot")]
    Empty,
}

fn render_history(file: PathBuf, kind: Kind, limit: usize) -> Result<String, RenderError> {
    let entries = HistoryStore::open(file, limit).entries(0)?;

    match kind {
        Kind::Log => Ok(render_log(&entries)),
        Kind::Chart => match render_chart(&entries, TERMINAL_CHART_WIDTH) {
            Some(chart) => Ok(format!("history {}\n{}", chart.caption(), chart.body)),
            None => Err(RenderError::Empty),
        },
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let config = match AppConfig::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            init_logging("info");
            error!(error = %e, "Unable to load config");
            return ExitCode::FAILURE;
        }
    };
    init_logging(&log_level(&args, &config));

    match args.command {
        Command::Start => {
            info!(
                upstream = %config.rate_it.upstream,
                exchanges = config.exchanges.len(),
                notifications = config.notifier.notifications.len(),
                "ratewatch starting"
            );

            let service = match Service::new(&config) {
                Ok(service) => service,
                Err(e) => {
                    error!(error = %e, "Unable to create service");
                    return ExitCode::FAILURE;
                }
            };
            service.run().await;
            info!("ratewatch stopped");
        }
        Command::History { file, kind, limit } => match render_history(file, kind, limit) {
            Ok(out) => print!("{}", out),
            Err(e) => {
                error!(error = %e, "history");
                return ExitCode::FAILURE;
            }
        },
    }

    ExitCode::SUCCESS
}
