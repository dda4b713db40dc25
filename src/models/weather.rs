//! Weather report model and display methods

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Description used for weather codes outside the table
pub const UNKNOWN_WEATHER: &str = "unknown weather conditions";

/// Convert a WMO weather code to its description.
///
/// Codes outside the table are [`UNKNOWN_WEATHER`].
#[must_use]
pub fn describe(code: u16) -> &'static str {
    match code {
        0 => "clear sky",
        1 => "mainly clear",
        2 => "partly cloudy",
        3 => "overcast",
        45 => "foggy",
        48 => "depositing rime fog",
        51 => "light drizzle",
        61 => "light rain",
        71 => "light snow",
        _ => UNKNOWN_WEATHER,
    }
}

/// Convert wind direction from degrees to cardinal direction
#[must_use]
pub fn wind_direction_to_cardinal(degrees: f64) -> &'static str {
    if !degrees.is_finite() {
        return "Unknown";
    }
    const POINTS: [&str; 16] = [
        "N", "NNE", "NE", "ENE", "E", "ESE", "SE", "SSE", "S", "SSW", "SW", "WSW", "W", "WNW",
        "NW", "NNW",
    ];
    let normalized = degrees.rem_euclid(360.0);
    // 22.5° sectors centred on each point
    let index = ((normalized + 11.25) / 22.5) as usize % POINTS.len();
    POINTS[index]
}

/// Conditions at observation time
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CurrentConditions {
    /// Temperature in Celsius
    pub temperature: f64,
    /// Wind speed in km/h
    pub wind_speed: f64,
    /// Wind direction in degrees (0-360, where 0/360 is North)
    pub wind_direction: f64,
    /// WMO weather code
    pub weather_code: u16,
    /// Description derived from the weather code
    pub description: String,
    /// Observation time, local to the place
    pub observed_at: NaiveDateTime,
}

impl CurrentConditions {
    /// Build the fixed one-paragraph summary
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "The current temperature is {:.1}°C with {}. \
             The wind is blowing at a speed of {:.1} km/h from {}°. \
             The weather data was last updated at {}. \
             Stay prepared for the day ahead!",
            self.temperature,
            self.description,
            self.wind_speed,
            self.wind_direction,
            self.observed_at.format("%Y-%m-%d %H:%M"),
        )
    }

    /// Format wind information
    #[must_use]
    pub fn format_wind(&self) -> String {
        format!(
            "{:.1} km/h from {} ({}°)",
            self.wind_speed,
            wind_direction_to_cardinal(self.wind_direction),
            self.wind_direction
        )
    }
}

/// One hour of the forecast
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct HourlySample {
    /// Local time at the start of the hour
    pub time: NaiveDateTime,
    /// Temperature in Celsius
    pub temperature: Option<f64>,
    /// Precipitation in mm
    pub precipitation: Option<f64>,
    /// Wind speed in km/h
    pub wind_speed: Option<f64>,
}

/// One day of the forecast
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DailySummary {
    pub date: NaiveDate,
    pub temperature_max: Option<f64>,
    pub temperature_min: Option<f64>,
    pub sunrise: Option<NaiveDateTime>,
    pub sunset: Option<NaiveDateTime>,
}

/// Complete weather report for one place
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct WeatherReport {
    /// Latitude the provider snapped to
    pub latitude: f64,
    /// Longitude the provider snapped to
    pub longitude: f64,
    /// IANA timezone the provider resolved for the coordinates
    pub timezone: Option<String>,
    pub current: CurrentConditions,
    /// Hourly series, ascending by time
    pub hourly: Vec<HourlySample>,
    /// Daily series, ascending by date
    pub daily: Vec<DailySummary>,
    /// Generated one-paragraph summary
    pub summary: String,
}

impl WeatherReport {
    /// Whether both series are non-empty and ascending
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        !self.hourly.is_empty()
            && !self.daily.is_empty()
            && self.hourly.windows(2).all(|w| w[0].time <= w[1].time)
            && self.daily.windows(2).all(|w| w[0].date <= w[1].date)
    }

    /// Total precipitation per day from the hourly series
    #[must_use]
    pub fn precipitation_by_day(&self) -> Vec<(NaiveDate, f64)> {
        let mut totals: Vec<(NaiveDate, f64)> = Vec::new();
        for sample in &self.hourly {
            let Some(amount) = sample.precipitation else {
                continue;
            };
            let date = sample.time.date();
            match totals.last_mut() {
                Some((last, total)) if *last == date => *total += amount,
                _ => totals.push((date, amount)),
            }
        }
        totals
    }

    /// Hour with the strongest wind
    #[must_use]
    pub fn strongest_wind(&self) -> Option<(NaiveDateTime, f64)> {
        self.hourly
            .iter()
            .filter_map(|s| s.wind_speed.map(|w| (s.time, w)))
            .fold(None, |best, (time, speed)| match best {
                Some((_, top)) if top >= speed => best,
                _ => Some((time, speed)),
            })
    }
}
