//! Core event types for the weather alert system
//!
//! This module defines the data published on the event bus: weather snapshots,
//! condition transitions, the monitored metrics and the topic names that tie
//! them together.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Timestamp type for consistent time handling across the application
pub type Timestamp = DateTime<Utc>;

/// Topic published once per successful poll cycle
pub const TOPIC_WEATHER_UPDATE: &str = "weather.update";
/// Topic published while temperature exceeds its raise threshold
pub const TOPIC_TEMPERATURE_HIGH: &str = "alert.temperature.high";
/// Topic published while wind speed exceeds its raise threshold
pub const TOPIC_WIND_HIGH: &str = "alert.wind.high";
/// Topic published while humidity exceeds its raise threshold
pub const TOPIC_HUMIDITY_HIGH: &str = "alert.humidity.high";
/// Topic published when the reported condition differs from the previous cycle
pub const TOPIC_CONDITION_CHANGED: &str = "condition.changed";

/// Measurement system requested from the provider
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    /// Celsius and metres per second
    #[default]
    Metric,
    /// Fahrenheit and miles per hour
    Imperial,
}

impl Units {
    /// Query parameter value understood by the provider
    pub fn as_str(&self) -> &'static str {
        match self {
            Units::Metric => "metric",
            Units::Imperial => "imperial",
        }
    }

    pub fn temperature_label(&self) -> &'static str {
        match self {
            Units::Metric => "°C",
            Units::Imperial => "°F",
        }
    }

    pub fn wind_label(&self) -> &'static str {
        match self {
            Units::Metric => "m/s",
            Units::Imperial => "mph",
        }
    }
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable reading of current weather conditions
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Snapshot {
    /// Air temperature in the requested units
    pub temperature: f64,
    /// Perceived temperature in the requested units
    pub feels_like: f64,
    /// Relative humidity as a percentage (0-100)
    pub humidity: f64,
    /// Wind speed in the requested units, never negative
    pub wind_speed: f64,
    /// Short condition code such as "Rain" or "Clear"
    pub condition: String,
    /// Human-readable description such as "light rain"
    pub description: String,
    /// Location name as reported by the provider
    pub location: String,
    /// When the snapshot was taken
    pub timestamp: Timestamp,
}

impl Snapshot {
    /// Current value of the given metric
    pub fn value_of(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Temperature => self.temperature,
            Metric::WindSpeed => self.wind_speed,
            Metric::Humidity => self.humidity,
        }
    }
}

/// Transition between two consecutive weather conditions at one location
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConditionChange {
    pub previous: String,
    pub current: String,
    pub description: String,
    pub location: String,
    pub timestamp: Timestamp,
}

/// Payload carried on the event bus
#[derive(Debug, Clone, PartialEq)]
pub enum WeatherEvent {
    /// A full snapshot, used by the update topic and every alert topic
    Snapshot(Snapshot),
    /// A condition transition, used by the condition-changed topic
    ConditionChanged(ConditionChange),
}

/// Metrics monitored against raise and recovery thresholds
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Temperature,
    WindSpeed,
    Humidity,
}

impl Metric {
    /// All metrics in the order they are evaluated each cycle
    pub const ALL: [Metric; 3] = [Metric::Temperature, Metric::WindSpeed, Metric::Humidity];

    /// Topic published while this metric exceeds its raise threshold
    pub fn alert_topic(&self) -> &'static str {
        match self {
            Metric::Temperature => TOPIC_TEMPERATURE_HIGH,
            Metric::WindSpeed => TOPIC_WIND_HIGH,
            Metric::Humidity => TOPIC_HUMIDITY_HIGH,
        }
    }

    /// Reverse lookup of [`Metric::alert_topic`]
    pub fn from_alert_topic(topic: &str) -> Option<Metric> {
        Metric::ALL
            .into_iter()
            .find(|metric| metric.alert_topic() == topic)
    }

    /// Human-readable name used in notifications
    pub fn display_name(&self) -> &'static str {
        match self {
            Metric::Temperature => "Temperature",
            Metric::WindSpeed => "Wind speed",
            Metric::Humidity => "Humidity",
        }
    }

    /// Unit label for this metric's values
    pub fn unit_label(&self, units: Units) -> &'static str {
        match self {
            Metric::Temperature => units.temperature_label(),
            Metric::WindSpeed => units.wind_label(),
            Metric::Humidity => "%",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}
