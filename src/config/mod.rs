/// Configuration loading and validation
pub mod config;

pub use config::{
    Config, ConsoleSinkConfig, MetricThresholds, ProviderConfig, SinksConfig,
    TelegramSinkConfig, Thresholds, ENV_API_KEY, ENV_LOCATION, ENV_TELEGRAM_CHAT_ID,
    ENV_TELEGRAM_TOKEN,
};
