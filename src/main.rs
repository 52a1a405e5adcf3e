use anyhow::{bail, Context};
use clap::Parser;
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use weather_alerts::alerts::{AlertTracker, NotificationSink};
use weather_alerts::bus::EventBus;
use weather_alerts::config::{Config, ENV_API_KEY};
use weather_alerts::error::ConfigError;
use weather_alerts::events::{Units, WeatherEvent};
use weather_alerts::provider::OpenWeatherProvider;
use weather_alerts::sampler::{Poller, Sampler};
use weather_alerts::sinks::{ConsoleSink, TelegramSink};

/// Command-line arguments for the weather alert daemon
#[derive(Parser)]
#[command(
    name = "weather-alerts",
    about = "Weather alert daemon - polls current conditions and notifies on threshold crossings",
    long_about = "Polls a weather provider for one location at a fixed interval, raises an alert \
                  once when temperature, wind speed or humidity crosses its threshold, clears it \
                  when the value recovers, and reports condition changes to the console and \
                  optionally to Telegram."
)]
struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Configuration file path (TOML format)"
    )]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(
        short,
        long,
        help = "Enable verbose logging output (sets RUST_LOG=debug)"
    )]
    verbose: bool,

    /// Location override
    #[arg(short, long, help = "Location to monitor, e.g. \"London,UK\"")]
    location: Option<String>,

    /// Units override
    #[arg(short, long, value_enum, help = "Measurement units")]
    units: Option<Units>,

    /// Interval override
    #[arg(short, long, value_name = "SECONDS", help = "Seconds between polls")]
    interval: Option<u64>,
}

impl Cli {
    /// Validate the CLI arguments
    ///
    /// Missing config files are not an error here; they fall back to defaults in
    /// `WeatherAlertSystem::load_config`.
    fn validate(&self) -> Result<(), String> {
        if let Some(ref config_path) = self.config {
            if config_path.exists() {
                if !config_path.is_file() {
                    return Err(format!(
                        "Configuration path is not a file: {}",
                        config_path.display()
                    ));
                }

                if let Some(extension) = config_path.extension() {
                    if extension != "toml" {
                        warn!(
                            "Configuration file does not have .toml extension: {}",
                            config_path.display()
                        );
                    }
                }
            }
        }

        if let Some(ref location) = self.location {
            if location.trim().is_empty() {
                return Err("Location must not be empty".to_string());
            }
        }

        if self.interval == Some(0) {
            return Err("Interval must be greater than 0 seconds".to_string());
        }

        Ok(())
    }

    /// Apply command-line overrides on top of file and environment settings
    fn apply_overrides(&self, config: &mut Config) {
        if let Some(ref location) = self.location {
            config.location = location.clone();
        }
        if let Some(units) = self.units {
            config.units = units;
        }
        if let Some(interval) = self.interval {
            config.interval_seconds = interval;
        }
    }
}

/// Composition root: owns the bus, the trackers' subscriptions and the poller
pub struct WeatherAlertSystem {
    config: Config,
    poller: Poller,
    /// Number of trackers subscribed to the bus
    tracker_count: usize,
    shutdown_sender: Sender<()>,
    shutdown_receiver: Receiver<()>,
}

impl WeatherAlertSystem {
    /// Wire up provider, bus, per-sink trackers and poller
    ///
    /// # Errors
    ///
    /// Fails if the provider API key is missing or an enabled sink cannot be built.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        if config.provider.api_key.trim().is_empty() {
            bail!(
                "No weather provider API key configured; set provider.api_key or {}",
                ENV_API_KEY
            );
        }

        let provider = OpenWeatherProvider::from_config(&config.provider)
            .context("Failed to create weather provider")?;

        let bus: Arc<EventBus<WeatherEvent>> = Arc::new(EventBus::new());
        let tracker_count = Self::subscribe_trackers(&config, &bus)?;
        if tracker_count == 0 {
            warn!("No notification sinks enabled; alerts will only be logged");
        }

        let sampler = Sampler::new(Arc::new(provider), Arc::clone(&bus), &config);
        let poller = Poller::new(sampler, Duration::from_secs(config.interval_seconds));

        let (shutdown_sender, shutdown_receiver) = mpsc::channel();

        Ok(Self {
            config,
            poller,
            tracker_count,
            shutdown_sender,
            shutdown_receiver,
        })
    }

    /// Create one tracker per enabled sink and subscribe it to the bus
    fn subscribe_trackers(config: &Config, bus: &EventBus<WeatherEvent>) -> anyhow::Result<usize> {
        let mut sinks: Vec<(&str, Box<dyn NotificationSink>, bool)> = Vec::new();

        if config.sinks.console.enabled {
            let sink: Box<dyn NotificationSink> = Box::new(ConsoleSink::new());
            sinks.push(("console", sink, config.sinks.console.forward_updates));
        }

        if config.sinks.telegram.enabled {
            let sink: Box<dyn NotificationSink> = Box::new(
                TelegramSink::from_config(&config.sinks.telegram)
                    .context("Failed to create Telegram sink")?,
            );
            sinks.push(("telegram", sink, config.sinks.telegram.forward_updates));
        }

        let count = sinks.len();
        for (name, sink, forward_updates) in sinks {
            let tracker = AlertTracker::new(name, sink, config.thresholds, config.units)
                .with_forward_updates(forward_updates);
            AlertTracker::subscribe(Arc::new(Mutex::new(tracker)), bus);
            info!("Enabled {} notifications", name);
        }

        Ok(count)
    }

    /// Load configuration from file, falling back to defaults
    ///
    /// Environment overrides are applied on top of whatever was loaded. The result
    /// is not validated; `main` validates once the command-line layer is applied.
    pub fn load_config(config_path: Option<&Path>) -> Config {
        Self::load_config_with(config_path, |key| std::env::var(key).ok())
    }

    /// Same as [`WeatherAlertSystem::load_config`] with an explicit override lookup
    fn load_config_with<F>(config_path: Option<&Path>, lookup: F) -> Config
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match config_path {
            Some(path) => {
                info!("Loading configuration from: {}", path.display());
                match Config::from_file(path) {
                    Ok(config) => config,
                    Err(ConfigError::ReadError(_)) => {
                        warn!(
                            "Configuration file '{}' not found or unreadable, using defaults",
                            path.display()
                        );
                        Config::default()
                    }
                    Err(e) => {
                        error!("Configuration error in '{}': {}", path.display(), e);
                        warn!("Using default configuration due to invalid config file");
                        Config::default()
                    }
                }
            }
            None => {
                info!("Using default configuration");
                Config::default()
            }
        };

        config.apply_overrides(lookup);
        config
    }

    pub fn start(&mut self) -> anyhow::Result<()> {
        info!(
            "Monitoring weather for {} every {}s ({} units, {} sinks)",
            self.config.location, self.config.interval_seconds, self.config.units, self.tracker_count
        );
        self.poller.start()?;
        Ok(())
    }

    pub fn stop(&mut self) -> anyhow::Result<()> {
        info!("Stopping weather alert system");
        self.poller.stop()?;
        info!("Weather alert system stopped");
        Ok(())
    }

    /// Block until a shutdown signal is received
    pub fn wait_for_shutdown(&self) -> anyhow::Result<()> {
        info!("Waiting for shutdown signal...");
        self.shutdown_receiver
            .recv()
            .context("Shutdown channel closed unexpectedly")?;
        info!("Shutdown signal received");
        Ok(())
    }
}

fn main() {
    let cli = Cli::parse();

    if cli.verbose {
        std::env::set_var("RUST_LOG", "debug");
    }
    env_logger::init();

    info!("Starting weather alert system");

    if let Err(e) = cli.validate() {
        error!("Invalid arguments: {}", e);
        std::process::exit(1);
    }

    let mut config = WeatherAlertSystem::load_config(cli.config.as_deref());
    cli.apply_overrides(&mut config);
    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        std::process::exit(1);
    }

    let mut system = match WeatherAlertSystem::new(config) {
        Ok(system) => system,
        Err(e) => {
            error!("Failed to initialize weather alert system: {:#}", e);
            std::process::exit(1);
        }
    };

    let shutdown_sender = system.shutdown_sender.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received interrupt signal, shutting down gracefully...");
        if let Err(e) = shutdown_sender.send(()) {
            error!("Failed to send shutdown signal: {}", e);
        }
    }) {
        error!("Failed to install interrupt handler: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = system.start() {
        error!("Failed to start weather alert system: {:#}", e);
        std::process::exit(1);
    }

    info!("Weather alert system is running. Press Ctrl+C to stop.");

    if let Err(e) = system.wait_for_shutdown() {
        error!("Error during shutdown wait: {:#}", e);
    }

    if let Err(e) = system.stop() {
        error!("Error during shutdown: {:#}", e);
        std::process::exit(1);
    }

    info!("Shutdown complete");
}
