use crate::config::ProviderConfig;
use crate::error::ProviderError;
use crate::events::{Snapshot, Timestamp, Units};
use crate::provider::WeatherProvider;
use chrono::Utc;
use log::debug;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tokio::runtime::{Builder, Runtime};

/// Longest provider error body kept in a `ProviderError::Status`
const MAX_ERROR_BODY_CHARS: usize = 200;

/// OpenWeatherMap current-weather provider
///
/// Issues one `GET` per fetch against the current-weather endpoint. Requests run
/// on a private single-threaded Tokio runtime, so `fetch_snapshot` must be called
/// from a plain thread (the poller thread), never from inside another runtime.
pub struct OpenWeatherProvider {
    client: Client,
    runtime: Runtime,
    api_key: String,
    base_url: String,
}

/// Response format from the current-weather endpoint (only the fields we use)
#[derive(Debug, Deserialize)]
struct CurrentWeatherResponse {
    main: MainSection,
    wind: WindSection,
    weather: Vec<ConditionSection>,
    name: String,
}

#[derive(Debug, Deserialize)]
struct MainSection {
    temp: f64,
    feels_like: f64,
    humidity: f64,
}

#[derive(Debug, Deserialize)]
struct WindSection {
    speed: f64,
}

#[derive(Debug, Deserialize)]
struct ConditionSection {
    main: String,
    description: String,
}

impl OpenWeatherProvider {
    /// Create a new provider
    ///
    /// # Arguments
    /// * `api_key` - OpenWeatherMap API key
    /// * `base_url` - Current-weather endpoint URL
    /// * `timeout` - Upper bound for a single request
    ///
    /// # Errors
    ///
    /// Returns `ProviderError` if the HTTP client or runtime cannot be built.
    pub fn new(api_key: String, base_url: String, timeout: Duration) -> Result<Self, ProviderError> {
        let client = Client::builder().timeout(timeout).build()?;
        let runtime = Builder::new_current_thread().enable_all().build()?;

        Ok(Self {
            client,
            runtime,
            api_key,
            base_url,
        })
    }

    /// Create a provider from the `[provider]` configuration section
    pub fn from_config(config: &ProviderConfig) -> Result<Self, ProviderError> {
        Self::new(
            config.api_key.clone(),
            config.base_url.clone(),
            Duration::from_secs(config.timeout_seconds),
        )
    }

    async fn fetch(&self, location: &str, units: Units) -> Result<Snapshot, ProviderError> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("q", location),
                ("appid", self.api_key.as_str()),
                ("units", units.as_str()),
            ])
            .send()
            .await
            .map_err(map_request_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }

        let body = response.text().await.map_err(map_request_error)?;
        debug!("Received {} bytes of weather data for {}", body.len(), location);

        parse_response(&body, Utc::now())
    }
}

impl WeatherProvider for OpenWeatherProvider {
    fn fetch_snapshot(&self, location: &str, units: Units) -> Result<Snapshot, ProviderError> {
        self.runtime.block_on(self.fetch(location, units))
    }
}

/// The request URL carries the API key as `appid`, so it is stripped from errors
fn map_request_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout
    } else {
        ProviderError::HttpError(e.without_url())
    }
}

/// Convert a current-weather JSON body into a snapshot
///
/// Every required field must be present and plausible; otherwise the whole body
/// is rejected.
pub(crate) fn parse_response(body: &str, timestamp: Timestamp) -> Result<Snapshot, ProviderError> {
    let response: CurrentWeatherResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::InvalidResponse(format!("JSON parsing failed: {}", e)))?;

    let condition = response.weather.into_iter().next().ok_or_else(|| {
        ProviderError::InvalidResponse("response has no weather conditions".to_string())
    })?;

    let main = response.main;
    if !main.temp.is_finite() || !main.feels_like.is_finite() {
        return Err(ProviderError::InvalidResponse(
            "temperature is not a finite number".to_string(),
        ));
    }
    if !(0.0..=100.0).contains(&main.humidity) {
        return Err(ProviderError::InvalidResponse(format!(
            "humidity {} is outside 0-100",
            main.humidity
        )));
    }
    if !response.wind.speed.is_finite() || response.wind.speed < 0.0 {
        return Err(ProviderError::InvalidResponse(format!(
            "wind speed {} is negative",
            response.wind.speed
        )));
    }

    Ok(Snapshot {
        temperature: main.temp,
        feels_like: main.feels_like,
        humidity: main.humidity,
        wind_speed: response.wind.speed,
        condition: condition.main,
        description: condition.description,
        location: response.name,
        timestamp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::serve_once;

    const SAMPLE_RESPONSE: &str = r#"{
        "coord": {"lon": -0.1257, "lat": 51.5085},
        "weather": [
            {"id": 500, "main": "Rain", "description": "light rain", "icon": "10d"},
            {"id": 701, "main": "Mist", "description": "mist", "icon": "50d"}
        ],
        "base": "stations",
        "main": {
            "temp": 14.2,
            "feels_like": 13.6,
            "temp_min": 12.9,
            "temp_max": 15.1,
            "pressure": 1012,
            "humidity": 82
        },
        "visibility": 10000,
        "wind": {"speed": 4.63, "deg": 240},
        "clouds": {"all": 75},
        "dt": 1700000000,
        "name": "London",
        "cod": 200
    }"#;

    #[test]
    fn test_parse_response() {
        let timestamp = Utc::now();
        let snapshot = parse_response(SAMPLE_RESPONSE, timestamp).unwrap();

        assert_eq!(snapshot.temperature, 14.2);
        assert_eq!(snapshot.feels_like, 13.6);
        assert_eq!(snapshot.humidity, 82.0);
        assert_eq!(snapshot.wind_speed, 4.63);
        assert_eq!(snapshot.condition, "Rain");
        assert_eq!(snapshot.description, "light rain");
        assert_eq!(snapshot.location, "London");
        assert_eq!(snapshot.timestamp, timestamp);
    }

    #[test]
    fn test_parse_response_missing_field() {
        let body = r#"{
            "weather": [{"main": "Clear", "description": "clear sky"}],
            "main": {"temp": 20.0, "humidity": 40},
            "wind": {"speed": 1.0},
            "name": "Madrid"
        }"#;

        let result = parse_response(body, Utc::now());
        assert!(matches!(result, Err(ProviderError::InvalidResponse(_))));
    }

    #[test]
    fn test_parse_response_empty_weather_list() {
        let body = r#"{
            "weather": [],
            "main": {"temp": 20.0, "feels_like": 19.0, "humidity": 40},
            "wind": {"speed": 1.0},
            "name": "Madrid"
        }"#;

        let result = parse_response(body, Utc::now());
        assert!(matches!(result, Err(ProviderError::InvalidResponse(_))));
    }

    #[test]
    fn test_parse_response_negative_wind() {
        let body = r#"{
            "weather": [{"main": "Clear", "description": "clear sky"}],
            "main": {"temp": 20.0, "feels_like": 19.0, "humidity": 40},
            "wind": {"speed": -3.0},
            "name": "Madrid"
        }"#;

        let result = parse_response(body, Utc::now());
        assert!(matches!(result, Err(ProviderError::InvalidResponse(_))));
    }

    #[test]
    fn test_parse_response_humidity_out_of_range() {
        let body = r#"{
            "weather": [{"main": "Clear", "description": "clear sky"}],
            "main": {"temp": 20.0, "feels_like": 19.0, "humidity": 140},
            "wind": {"speed": 1.0},
            "name": "Madrid"
        }"#;

        let result = parse_response(body, Utc::now());
        assert!(matches!(result, Err(ProviderError::InvalidResponse(_))));
    }

    #[test]
    fn test_parse_response_not_json() {
        let result = parse_response("<html>502 Bad Gateway</html>", Utc::now());
        assert!(matches!(result, Err(ProviderError::InvalidResponse(_))));
    }

    #[test]
    fn test_provider_creation() {
        let provider = OpenWeatherProvider::from_config(&ProviderConfig::default());
        assert!(provider.is_ok());
    }

    #[test]
    fn test_unreachable_provider_returns_error() {
        // Port 9 (discard) on localhost is not expected to serve HTTP
        let provider = OpenWeatherProvider::new(
            "key".to_string(),
            "http://127.0.0.1:9/data/2.5/weather".to_string(),
            Duration::from_secs(2),
        )
        .unwrap();

        let result = provider.fetch_snapshot("London", Units::Metric);
        assert!(result.is_err());
    }

    #[test]
    fn test_transport_error_hides_api_key() {
        let provider = OpenWeatherProvider::new(
            "SECRETKEY".to_string(),
            "http://127.0.0.1:9/data/2.5/weather".to_string(),
            Duration::from_secs(2),
        )
        .unwrap();

        let error = provider
            .fetch_snapshot("London", Units::Metric)
            .unwrap_err();
        assert!(!error.to_string().contains("SECRETKEY"));
        assert!(!format!("{:?}", error).contains("SECRETKEY"));
    }

    fn provider_for(base: String) -> OpenWeatherProvider {
        OpenWeatherProvider::new(
            "key".to_string(),
            format!("{}/data/2.5/weather", base),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_unauthorized_status() {
        let base = serve_once(
            "401 Unauthorized",
            r#"{"cod":401,"message":"Invalid API key"}"#,
        );

        let result = provider_for(base).fetch_snapshot("London", Units::Metric);
        match result {
            Err(ProviderError::Status { status, body }) => {
                assert_eq!(status, 401);
                assert!(body.contains("Invalid API key"));
            }
            other => panic!("expected Status error, got {:?}", other),
        }
    }

    #[test]
    fn test_server_error_status() {
        let base = serve_once(
            "500 Internal Server Error",
            r#"{"cod":500,"message":"Internal error"}"#,
        );

        let result = provider_for(base).fetch_snapshot("London", Units::Metric);
        assert!(matches!(
            result,
            Err(ProviderError::Status { status: 500, .. })
        ));
    }

    #[test]
    fn test_successful_fetch() {
        let base = serve_once("200 OK", SAMPLE_RESPONSE);

        let snapshot = provider_for(base)
            .fetch_snapshot("London", Units::Metric)
            .unwrap();
        assert_eq!(snapshot.location, "London");
        assert_eq!(snapshot.condition, "Rain");
    }
}
