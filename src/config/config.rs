use crate::error::ConfigError;
use crate::events::{Metric, Units};
use serde::Deserialize;
use std::path::Path;

/// Environment variable overriding the provider API key
pub const ENV_API_KEY: &str = "OPENWEATHER_API_KEY";
/// Environment variable overriding the Telegram bot token
pub const ENV_TELEGRAM_TOKEN: &str = "TELEGRAM_BOT_TOKEN";
/// Environment variable overriding the Telegram chat id
pub const ENV_TELEGRAM_CHAT_ID: &str = "TELEGRAM_CHAT_ID";
/// Environment variable overriding the monitored location
pub const ENV_LOCATION: &str = "WEATHER_LOCATION";

/// Application configuration
///
/// Every section is optional in the TOML file; missing values fall back to the
/// defaults below.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Location queried from the provider
    pub location: String,
    /// Measurement system for readings and thresholds
    pub units: Units,
    /// Seconds between poll cycles
    pub interval_seconds: u64,
    pub provider: ProviderConfig,
    pub thresholds: Thresholds,
    pub sinks: SinksConfig,
}

/// Weather provider connection settings
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProviderConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout_seconds: u64,
}

/// Raise and recovery thresholds for one metric
///
/// An alert is raised while the value is strictly above `raise` and cleared once
/// the value is at or below `recover`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricThresholds {
    pub raise: f64,
    pub recover: f64,
}

impl MetricThresholds {
    pub fn new(raise: f64, recover: f64) -> Self {
        Self { raise, recover }
    }

    /// Whether a value should raise an alert
    pub fn is_exceeded(&self, value: f64) -> bool {
        value > self.raise
    }

    /// Whether a value clears an active alert
    pub fn is_recovered(&self, value: f64) -> bool {
        value <= self.recover
    }
}

/// Thresholds for every monitored metric
///
/// Any value left out of the file keeps that metric's default, so a section
/// may set only `raise` or only `recover`.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(from = "ThresholdsFile")]
pub struct Thresholds {
    pub temperature: MetricThresholds,
    pub wind_speed: MetricThresholds,
    pub humidity: MetricThresholds,
}

/// `[thresholds]` as written in the file
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ThresholdsFile {
    temperature: PartialThresholds,
    wind_speed: PartialThresholds,
    humidity: PartialThresholds,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PartialThresholds {
    raise: Option<f64>,
    recover: Option<f64>,
}

impl PartialThresholds {
    fn or(self, fallback: MetricThresholds) -> MetricThresholds {
        MetricThresholds {
            raise: self.raise.unwrap_or(fallback.raise),
            recover: self.recover.unwrap_or(fallback.recover),
        }
    }
}

impl From<ThresholdsFile> for Thresholds {
    fn from(file: ThresholdsFile) -> Self {
        let defaults = Thresholds::default();
        Self {
            temperature: file.temperature.or(defaults.temperature),
            wind_speed: file.wind_speed.or(defaults.wind_speed),
            humidity: file.humidity.or(defaults.humidity),
        }
    }
}

impl Thresholds {
    pub fn for_metric(&self, metric: Metric) -> MetricThresholds {
        match metric {
            Metric::Temperature => self.temperature,
            Metric::WindSpeed => self.wind_speed,
            Metric::Humidity => self.humidity,
        }
    }
}

/// Notification sink settings
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct SinksConfig {
    pub console: ConsoleSinkConfig,
    pub telegram: TelegramSinkConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConsoleSinkConfig {
    pub enabled: bool,
    /// Print every weather update, not only alerts
    pub forward_updates: bool,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct TelegramSinkConfig {
    pub enabled: bool,
    pub bot_token: String,
    pub chat_id: String,
    /// Upper bound for a single send, in seconds
    pub timeout_seconds: u64,
    pub forward_updates: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            location: "London".to_string(),
            units: Units::Metric,
            interval_seconds: 300,
            provider: ProviderConfig::default(),
            thresholds: Thresholds::default(),
            sinks: SinksConfig::default(),
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.openweathermap.org/data/2.5/weather".to_string(),
            timeout_seconds: 10,
        }
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            temperature: MetricThresholds::new(35.0, 30.0),
            wind_speed: MetricThresholds::new(15.0, 10.0),
            humidity: MetricThresholds::new(80.0, 75.0),
        }
    }
}

impl Default for ConsoleSinkConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            forward_updates: true,
        }
    }
}

impl Default for TelegramSinkConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bot_token: String::new(),
            chat_id: String::new(),
            timeout_seconds: 10,
            forward_updates: false,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML file
    ///
    /// The result is not validated: credentials and other values may still be
    /// supplied by environment and command-line overrides, so callers run
    /// [`Config::validate`] once every layer has been applied.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ReadError` if the file cannot be read and
    /// `ConfigError::TomlError` if it is not valid TOML for this schema.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&contents)
    }

    /// Parse configuration from TOML text without validating it
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Apply overrides from an arbitrary key lookup
    ///
    /// Empty values are ignored so an exported-but-blank variable does not wipe a
    /// credential from the file.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(api_key) = lookup(ENV_API_KEY) {
            self.provider.api_key = api_key;
        }
        if let Some(token) = lookup(ENV_TELEGRAM_TOKEN) {
            self.sinks.telegram.bot_token = token;
        }
        if let Some(chat_id) = lookup(ENV_TELEGRAM_CHAT_ID) {
            self.sinks.telegram.chat_id = chat_id;
        }
        if let Some(location) = lookup(ENV_LOCATION) {
            self.location = location;
        }
    }

    /// Check that all values are usable
    ///
    /// The provider API key is not checked here because it is commonly supplied
    /// through the environment after the file is loaded.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.location.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "location must not be empty".to_string(),
            ));
        }

        if self.interval_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "interval_seconds must be greater than 0".to_string(),
            ));
        }

        if self.provider.timeout_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "provider.timeout_seconds must be greater than 0".to_string(),
            ));
        }

        for metric in Metric::ALL {
            let thresholds = self.thresholds.for_metric(metric);
            if !thresholds.raise.is_finite() || !thresholds.recover.is_finite() {
                return Err(ConfigError::ValidationError(format!(
                    "{} thresholds must be finite numbers",
                    metric
                )));
            }
            if thresholds.recover > thresholds.raise {
                return Err(ConfigError::ValidationError(format!(
                    "{} recovery threshold ({}) must not exceed its raise threshold ({})",
                    metric, thresholds.recover, thresholds.raise
                )));
            }
        }

        if self.thresholds.wind_speed.recover < 0.0 {
            return Err(ConfigError::ValidationError(
                "wind_speed thresholds must not be negative".to_string(),
            ));
        }

        let humidity = self.thresholds.humidity;
        if !(0.0..=100.0).contains(&humidity.raise) || !(0.0..=100.0).contains(&humidity.recover) {
            return Err(ConfigError::ValidationError(
                "humidity thresholds must be between 0 and 100".to_string(),
            ));
        }

        let telegram = &self.sinks.telegram;
        if telegram.enabled {
            if telegram.bot_token.trim().is_empty() || telegram.chat_id.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "telegram sink requires bot_token and chat_id".to_string(),
                ));
            }
            if telegram.timeout_seconds == 0 {
                return Err(ConfigError::ValidationError(
                    "sinks.telegram.timeout_seconds must be greater than 0".to_string(),
                ));
            }
        }

        Ok(())
    }
}
