//! Weather API client for Open-Meteo
//!
//! Fetches current conditions plus hourly and daily series for a pair of
//! coordinates and turns the payload into a [`WeatherReport`]. There is no
//! retry and no partial result: the fetch either yields a complete report or
//! a [`FetchError`].

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use crate::config::WeatherConfig;
use crate::models::WeatherReport;

/// Hourly variables requested from the provider
const HOURLY_FIELDS: &str = "temperature_2m,precipitation,wind_speed_10m";
/// Daily variables requested from the provider
const DAILY_FIELDS: &str = "temperature_2m_max,temperature_2m_min,sunrise,sunset";

/// Failure of a weather fetch
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    /// Coordinates outside the WGS84 range; no request was made
    #[error("invalid coordinates: lat={latitude}, lon={longitude}")]
    InvalidCoordinates { latitude: f64, longitude: f64 },

    /// Network failure, non-success status, or malformed payload
    #[error("weather provider unavailable (status {status:?}): {body}")]
    UpstreamUnavailable { status: Option<u16>, body: String },
}

/// Check that coordinates are finite and inside the WGS84 range
pub fn validate_coordinates(latitude: f64, longitude: f64) -> Result<(), FetchError> {
    if (-90.0..=90.0).contains(&latitude) && (-180.0..=180.0).contains(&longitude) {
        Ok(())
    } else {
        Err(FetchError::InvalidCoordinates {
            latitude,
            longitude,
        })
    }
}

/// Anything that can produce a weather report for coordinates
#[async_trait]
pub trait WeatherSource: Send + Sync {
    async fn fetch(&self, latitude: f64, longitude: f64) -> Result<WeatherReport, FetchError>;
}

/// Open-Meteo forecast client
#[derive(Debug, Clone)]
pub struct OpenMeteoClient {
    client: Client,
    base_url: String,
}

impl OpenMeteoClient {
    /// Create a new weather API client
    pub fn new(config: &WeatherConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds.into()))
            .user_agent(concat!("weather-chatbot/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn forecast_url(&self, latitude: f64, longitude: f64) -> String {
        format!(
            "{}/forecast?latitude={}&longitude={}&current_weather=true&hourly={}&daily={}&timezone=auto",
            self.base_url, latitude, longitude, HOURLY_FIELDS, DAILY_FIELDS
        )
    }
}

#[async_trait]
impl WeatherSource for OpenMeteoClient {
    #[instrument(skip(self))]
    async fn fetch(&self, latitude: f64, longitude: f64) -> Result<WeatherReport, FetchError> {
        validate_coordinates(latitude, longitude)?;

        info!(
            "Getting forecast for coordinates: {:.4}, {:.4}",
            latitude, longitude
        );
        let start_time = Instant::now();

        let url = self.forecast_url(latitude, longitude);
        debug!("OpenMeteo API request URL: {}", url);

        let response = self.client.get(&url).send().await.map_err(|e| {
            warn!("Network error: {}", e);
            FetchError::UpstreamUnavailable {
                status: None,
                body: e.to_string(),
            }
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| FetchError::UpstreamUnavailable {
            status: Some(status.as_u16()),
            body: e.to_string(),
        })?;

        if !status.is_success() {
            warn!("OpenMeteo returned HTTP {}", status);
            return Err(FetchError::UpstreamUnavailable {
                status: Some(status.as_u16()),
                body,
            });
        }

        let parse_start = Instant::now();
        let report = serde_json::from_str::<openmeteo::ForecastResponse>(&body)
            .map_err(|e| e.to_string())
            .and_then(openmeteo::ForecastResponse::into_report)
            .map_err(|message| {
                error!("Failed to parse forecast response: {}", message);
                FetchError::UpstreamUnavailable {
                    status: Some(status.as_u16()),
                    body: format!("malformed payload: {message}"),
                }
            })?;

        let total_duration = start_time.elapsed();
        info!(
            "Retrieved forecast with {} hourly and {} daily points in {:.3}s (parse: {:.3}s)",
            report.hourly.len(),
            report.daily.len(),
            total_duration.as_secs_f64(),
            parse_start.elapsed().as_secs_f64()
        );

        if total_duration.as_secs() > 5 {
            warn!(
                "Slow forecast API response: {:.3}s",
                total_duration.as_secs_f64()
            );
        }

        Ok(report)
    }
}

/// `OpenMeteo` API response structures and conversion
mod openmeteo {
    use chrono::{NaiveDate, NaiveDateTime};
    use serde::Deserialize;

    use crate::models::{
        CurrentConditions, DailySummary, HourlySample, WeatherReport, describe,
    };

    const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M";
    const DATE_FORMAT: &str = "%Y-%m-%d";

    #[derive(Debug, Deserialize)]
    pub struct ForecastResponse {
        pub latitude: f64,
        pub longitude: f64,
        pub timezone: Option<String>,
        pub current_weather: Option<CurrentWeather>,
        pub hourly: Option<HourlyData>,
        pub daily: Option<DailyData>,
    }

    #[derive(Debug, Deserialize)]
    pub struct CurrentWeather {
        pub temperature: f64,
        pub windspeed: f64,
        pub winddirection: f64,
        pub weathercode: u16,
        pub time: String,
    }

    #[derive(Debug, Deserialize)]
    pub struct HourlyData {
        pub time: Vec<String>,
        pub temperature_2m: Vec<Option<f64>>,
        pub precipitation: Vec<Option<f64>>,
        pub wind_speed_10m: Vec<Option<f64>>,
    }

    #[derive(Debug, Deserialize)]
    pub struct DailyData {
        pub time: Vec<String>,
        pub temperature_2m_max: Vec<Option<f64>>,
        pub temperature_2m_min: Vec<Option<f64>>,
        pub sunrise: Vec<Option<String>>,
        pub sunset: Vec<Option<String>>,
    }

    fn parse_time(value: &str) -> Result<NaiveDateTime, String> {
        NaiveDateTime::parse_from_str(value, TIME_FORMAT)
            .map_err(|e| format!("invalid timestamp '{value}': {e}"))
    }

    fn parse_optional_time(value: Option<&String>) -> Result<Option<NaiveDateTime>, String> {
        value.map(|v| parse_time(v)).transpose()
    }

    fn check_lengths(series: &str, expected: usize, lengths: &[usize]) -> Result<(), String> {
        if lengths.iter().all(|len| *len == expected) {
            Ok(())
        } else {
            Err(format!("{series} arrays have mismatched lengths"))
        }
    }

    impl ForecastResponse {
        /// Convert the payload into a report, rejecting anything incomplete
        pub fn into_report(self) -> Result<WeatherReport, String> {
            let current = self.current_weather.ok_or("missing current_weather")?;
            let hourly = self.hourly.ok_or("missing hourly series")?;
            let daily = self.daily.ok_or("missing daily series")?;

            let current = CurrentConditions {
                temperature: current.temperature,
                wind_speed: current.windspeed,
                wind_direction: current.winddirection,
                weather_code: current.weathercode,
                description: describe(current.weathercode).to_string(),
                observed_at: parse_time(&current.time)?,
            };

            check_lengths(
                "hourly",
                hourly.time.len(),
                &[
                    hourly.temperature_2m.len(),
                    hourly.precipitation.len(),
                    hourly.wind_speed_10m.len(),
                ],
            )?;
            let mut hourly_samples = hourly
                .time
                .iter()
                .enumerate()
                .map(|(i, time)| {
                    Ok(HourlySample {
                        time: parse_time(time)?,
                        temperature: hourly.temperature_2m[i],
                        precipitation: hourly.precipitation[i],
                        wind_speed: hourly.wind_speed_10m[i],
                    })
                })
                .collect::<Result<Vec<_>, String>>()?;

            check_lengths(
                "daily",
                daily.time.len(),
                &[
                    daily.temperature_2m_max.len(),
                    daily.temperature_2m_min.len(),
                    daily.sunrise.len(),
                    daily.sunset.len(),
                ],
            )?;
            let mut daily_summaries = daily
                .time
                .iter()
                .enumerate()
                .map(|(i, date)| {
                    Ok(DailySummary {
                        date: NaiveDate::parse_from_str(date, DATE_FORMAT)
                            .map_err(|e| format!("invalid date '{date}': {e}"))?,
                        temperature_max: daily.temperature_2m_max[i],
                        temperature_min: daily.temperature_2m_min[i],
                        sunrise: parse_optional_time(daily.sunrise[i].as_ref())?,
                        sunset: parse_optional_time(daily.sunset[i].as_ref())?,
                    })
                })
                .collect::<Result<Vec<_>, String>>()?;

            if hourly_samples.is_empty() || daily_summaries.is_empty() {
                return Err("empty forecast series".to_string());
            }

            hourly_samples.sort_by_key(|s| s.time);
            daily_summaries.sort_by_key(|d| d.date);

            let summary = current.summary();
            Ok(WeatherReport {
                latitude: self.latitude,
                longitude: self.longitude,
                timezone: self.timezone,
                current,
                hourly: hourly_samples,
                daily: daily_summaries,
                summary,
            })
        }
    }
}
