//! Application configuration.
//!
//! Config files may be YAML, JSON or TOML; the format follows the file
//! extension. Each file is layered over the built-in defaults in the order
//! given, so a later file only needs the keys it changes. Tables merge key
//! by key, arrays are replaced.

use ::config::{Config, Environment, File, Map};
use ratewatch_alerts::{HistoryLimits, NotificationConfig};
use ratewatch_core::Exchange;
use ratewatch_feeds::DEFAULT_UPSTREAM;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Prefix of the environment variable holding the Telegram bot token
/// (`TG_TOKEN`). It is the lowest layer, any config file overrides it.
pub const TOKEN_ENV_PREFIX: &str = "TG";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("unable to load config: {0}")]
    Load(#[from] ::config::ConfigError),
    #[error("invalid config: {0}")]
    Invalid(#[source] ::config::ConfigError),
    #[error("telegram API key is not set (use telegram.api_key or TG_TOKEN)")]
    MissingToken,
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Verbose logging.
    pub debug: bool,
    pub rate_it: RateItSettings,
    pub telegram: TelegramSettings,
    pub notifier: NotifierSettings,
    pub history: HistorySettings,
    /// Exchanges shown by `/rates`, in display order.
    pub exchanges: Vec<Exchange>,
    pub limits: Limits,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            debug: false,
            rate_it: RateItSettings::default(),
            telegram: TelegramSettings::default(),
            notifier: NotifierSettings::default(),
            history: HistorySettings::default(),
            exchanges: Exchange::defaults(),
            limits: Limits::default(),
        }
    }
}

/// Remote rate source settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateItSettings {
    pub upstream: String,
}

impl Default for RateItSettings {
    fn default() -> Self {
        Self {
            upstream: DEFAULT_UPSTREAM.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramSettings {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub api_key: String,
}

/// Notifier settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotifierSettings {
    /// Seconds between two checks of the newest history entry.
    pub check_period_secs: u64,
    pub notifications: Vec<NotificationConfig>,
}

impl Default for NotifierSettings {
    fn default() -> Self {
        Self {
            check_period_secs: 600,
            notifications: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistorySettings {
    /// Append-only rate log. Without it history commands report no data.
    pub storage_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Limits {
    pub history: HistoryLimits,
}


impl AppConfig {
    /// Defaults, then `TG_TOKEN`, then every file in `paths` in order.
    pub fn load<P: AsRef<Path>>(paths: &[P]) -> Result<Self, ConfigError> {
        Self::load_with_env(paths, None)
    }

    /// Like [`AppConfig::load`], reading the token from `env` instead of the
    /// process environment when given.
    fn load_with_env<P: AsRef<Path>>(
        paths: &[P],
        env: Option<Map<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut builder = Config::builder().add_source(Config::try_from(&AppConfig::default())?);
        if let Some(token) = env_token(env)? {
            builder = builder.set_default("telegram.api_key", token)?;
        }
        for path in paths {
            builder = builder.add_source(File::from(path.as_ref()).required(true));
        }

        builder
            .build()?
            .try_deserialize()
            .map_err(ConfigError::Invalid)
    }

    pub fn check_period(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.notifier.check_period_secs as i64)
    }

    /// Bot token, required to run the service.
    pub fn api_key(&self) -> Result<&str, ConfigError> {
        match self.telegram.api_key.trim() {
            "" => Err(ConfigError::MissingToken),
            key => Ok(key),
        }
    }
}

fn env_token(env: Option<Map<String, String>>) -> Result<Option<String>, ConfigError> {
    let vars = Config::builder()
        .add_source(
            Environment::with_prefix(TOKEN_ENV_PREFIX)
                .try_parsing(false)
                .source(env),
        )
        .build()?;

    Ok(vars.get_string("token").ok().filter(|token| !token.is_empty()))
}
