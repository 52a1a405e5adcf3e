/// Weather data providers
pub mod openweather;

pub use openweather::OpenWeatherProvider;

use crate::error::ProviderError;
use crate::events::{Snapshot, Units};

/// Source of current weather snapshots
///
/// A fetch either yields a complete snapshot or an error; implementations never
/// return partially populated readings.
#[cfg_attr(test, mockall::automock)]
pub trait WeatherProvider: Send + Sync {
    /// Fetch the current conditions for a location
    fn fetch_snapshot(&self, location: &str, units: Units) -> Result<Snapshot, ProviderError>;
}
