//! Process configuration from environment variables

use secrecy::SecretString;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_API_URL: &str = "https://api.telegram.org";
const DEFAULT_SOFFICE: &str = "soffice";
const DEFAULT_POLL_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} is not valid: {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug)]
pub struct Config {
    /// `BOT_TOKEN`
    pub bot_token: SecretString,
    /// `TELEGRAM_API_URL`
    pub api_url: String,
    /// `CONVERTER_TEMP_DIR`; job directories are created under it
    pub temp_dir: PathBuf,
    /// `SOFFICE_PATH`; empty disables document and spreadsheet conversions
    pub soffice: Option<PathBuf>,
    /// `POLL_TIMEOUT_SECS`
    pub poll_timeout: Duration,
    /// `CONVERSION_TIMEOUT_SECS`; unset means conversions may run indefinitely
    pub conversion_timeout: Option<Duration>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bot_token = lookup("BOT_TOKEN")
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty())
            .ok_or(ConfigError::Missing("BOT_TOKEN"))?;

        let api_url = lookup("TELEGRAM_API_URL")
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        if !(api_url.starts_with("https://") || api_url.starts_with("http://")) {
            return Err(ConfigError::Invalid {
                name: "TELEGRAM_API_URL",
                value: api_url,
            });
        }

        let temp_dir = lookup("CONVERTER_TEMP_DIR")
            .filter(|dir| !dir.trim().is_empty())
            .map_or_else(default_temp_dir, PathBuf::from);

        let soffice = match lookup("SOFFICE_PATH") {
            Some(path) if path.trim().is_empty() => None,
            Some(path) => Some(PathBuf::from(path)),
            None => Some(PathBuf::from(DEFAULT_SOFFICE)),
        };

        let poll_timeout = positive_secs(&lookup, "POLL_TIMEOUT_SECS")?
            .unwrap_or(Duration::from_secs(DEFAULT_POLL_TIMEOUT_SECS));
        let conversion_timeout = positive_secs(&lookup, "CONVERSION_TIMEOUT_SECS")?;

        Ok(Self {
            bot_token: SecretString::new(bot_token),
            api_url,
            temp_dir,
            soffice,
            poll_timeout,
            conversion_timeout,
        })
    }
}

/// A whole number of seconds greater than zero, if the variable is set
fn positive_secs(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<Duration>, ConfigError> {
    let Some(raw) = lookup(name) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<u64>()
        .ok()
        .filter(|secs| *secs > 0)
        .map(|secs| Some(Duration::from_secs(secs)))
        .ok_or(ConfigError::Invalid { name, value: raw })
}

fn default_temp_dir() -> PathBuf {
    std::env::current_dir()
        .map(|cwd| cwd.join("temp"))
        .unwrap_or_else(|_| std::env::temp_dir().join("file-converter-bot"))
}
