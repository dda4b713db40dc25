//! Response formatting
//!
//! Deterministic rendering of a [`WeatherReport`] into a markdown answer, and
//! of an [`AssistantError`] into a single user-facing sentence. Every number
//! shown comes from the report; missing values render as `-`.

pub mod buckets;

use std::fmt::{self, Write};

use chrono::{NaiveDate, NaiveDateTime};
use tracing::{debug, error};

use crate::error::{APOLOGY_MESSAGE, AssistantError};
use crate::models::{ResolvedPlace, WeatherReport};

pub use buckets::{DEFAULT_WINDOW_HOURS, HourlyBucket, bucket_hourly};

const GREETING: &str = "Hello! Here is the latest weather information";
const CLOSING: &str = "Thank you for asking! I can tell you the current conditions and the hourly and daily forecast for any city or place.";

/// Final text of an assistant turn
#[derive(Debug, Clone, PartialEq)]
pub struct FormattedResponse {
    pub text: String,
}

impl fmt::Display for FormattedResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Requests beyond the tables that can be answered from the report alone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hint {
    Precipitation,
    Wind,
}

const PRECIPITATION_WORDS: &[&str] = &[
    "rain", "raining", "rainy", "snow", "snowing", "snowy", "umbrella", "precipitation", "drizzle",
    "wet",
];
const WIND_WORDS: &[&str] = &["wind", "windy", "gust", "gusts", "gusty", "breeze"];

/// Recognised hints in a residual request, in a fixed order
#[must_use]
pub fn detect_hints(other_information: &str) -> Vec<Hint> {
    let words: Vec<String> = other_information
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect();
    let mentions = |list: &[&str]| words.iter().any(|w| list.contains(&w.as_str()));

    let mut hints = Vec::new();
    if mentions(PRECIPITATION_WORDS) {
        hints.push(Hint::Precipitation);
    }
    if mentions(WIND_WORDS) {
        hints.push(Hint::Wind);
    }
    hints
}

/// Render a turn outcome.
///
/// A formatting failure is logged and replaced by the generic apology.
#[must_use]
pub fn format(outcome: Result<(&ResolvedPlace, &WeatherReport), &AssistantError>) -> FormattedResponse {
    match outcome {
        Ok((place, report)) => format_report(place, report).unwrap_or_else(|e| {
            error!("Failed to format weather report: {}", e);
            FormattedResponse {
                text: APOLOGY_MESSAGE.to_string(),
            }
        }),
        Err(err) => format_error(err),
    }
}

/// Map an error to its user-facing message
#[must_use]
fn format_error(err: &AssistantError) -> FormattedResponse {
    debug!("Formatting error response for: {}", err);
    FormattedResponse {
        text: err.user_message(),
    }
}

/// Render a full weather answer
fn format_report(
    place: &ResolvedPlace,
    report: &WeatherReport,
) -> Result<FormattedResponse, AssistantError> {
    if report.hourly.is_empty() || report.daily.is_empty() {
        return Err(AssistantError::formatting("report has empty series"));
    }

    let mut out = String::new();
    writeln!(
        out,
        "{GREETING} for **{}** ({}).",
        place.name,
        place.format_coordinates()
    )?;
    writeln!(out)?;

    write_current(&mut out, report)?;
    write_daily(&mut out, report)?;
    write_hourly(&mut out, report)?;
    if let Some(other) = place.other_information.as_deref() {
        write_other_information(&mut out, other, report)?;
    }

    write!(out, "{CLOSING}")?;
    Ok(FormattedResponse { text: out })
}

fn cell(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.1}"))
}

fn clock(value: Option<NaiveDateTime>) -> String {
    value.map_or_else(|| "-".to_string(), |t| t.format("%H:%M").to_string())
}

fn write_current(out: &mut String, report: &WeatherReport) -> fmt::Result {
    writeln!(out, "### Current conditions")?;
    writeln!(out)?;
    writeln!(out, "{}", report.summary)?;
    writeln!(out)?;
    writeln!(out, "- Wind: {}", report.current.format_wind())?;
    writeln!(
        out,
        "- Forecast grid point: {:.4}, {:.4}{}",
        report.latitude,
        report.longitude,
        report
            .timezone
            .as_deref()
            .map(|tz| format!(" (timezone {tz})"))
            .unwrap_or_default()
    )?;
    writeln!(out)
}

fn write_daily(out: &mut String, report: &WeatherReport) -> fmt::Result {
    writeln!(out, "### Daily forecast")?;
    writeln!(out)?;
    writeln!(out, "| Date | Max temp (°C) | Min temp (°C) | Sunrise | Sunset |")?;
    writeln!(out, "|------|---------------|---------------|---------|--------|")?;
    for day in &report.daily {
        writeln!(
            out,
            "| {} | {} | {} | {} | {} |",
            day.date.format("%Y-%m-%d"),
            cell(day.temperature_max),
            cell(day.temperature_min),
            clock(day.sunrise),
            clock(day.sunset)
        )?;
    }
    writeln!(out)
}

fn write_hourly(out: &mut String, report: &WeatherReport) -> fmt::Result {
    writeln!(out, "### Hourly forecast ({DEFAULT_WINDOW_HOURS}-hour windows)")?;
    writeln!(out)?;
    writeln!(
        out,
        "| Period | Mean temp (°C) | Total precipitation (mm) | Mean wind speed (km/h) |"
    )?;
    writeln!(
        out,
        "|--------|----------------|--------------------------|------------------------|"
    )?;
    for bucket in bucket_hourly(&report.hourly, DEFAULT_WINDOW_HOURS) {
        writeln!(
            out,
            "| {} | {} | {} | {} |",
            bucket.label(),
            cell(bucket.mean_temperature),
            cell(bucket.total_precipitation),
            cell(bucket.mean_wind_speed)
        )?;
    }
    writeln!(out)
}

fn write_other_information(out: &mut String, other: &str, report: &WeatherReport) -> fmt::Result {
    writeln!(out, "### About your question")?;
    writeln!(out)?;

    let hints = detect_hints(other);
    if hints.is_empty() {
        writeln!(
            out,
            "You asked: \"{other}\". I can only answer that from the forecast tables above."
        )?;
        return writeln!(out);
    }

    for hint in hints {
        match hint {
            Hint::Precipitation => {
                let by_day = report.precipitation_by_day();
                let wettest = by_day
                    .iter()
                    .copied()
                    .fold(None::<(NaiveDate, f64)>, |best, (date, amount)| match best {
                        Some((_, top)) if top >= amount => best,
                        _ => Some((date, amount)),
                    });
                match wettest {
                    None => writeln!(out, "- Precipitation: no data in the forecast.")?,
                    Some((_, amount)) if amount <= 0.0 => {
                        writeln!(out, "- Precipitation: none expected in the forecast period.")?;
                    }
                    Some((date, amount)) => {
                        let sum: f64 = by_day.iter().map(|(_, a)| a).sum();
                        writeln!(
                            out,
                            "- Precipitation: {sum:.1} mm in total over the forecast period, most on {} ({amount:.1} mm).",
                            date.format("%Y-%m-%d")
                        )?;
                    }
                }
            }
            Hint::Wind => match report.strongest_wind() {
                Some((time, speed)) => writeln!(
                    out,
                    "- Wind: strongest at {} with {speed:.1} km/h.",
                    time.format("%Y-%m-%d %H:%M")
                )?,
                None => writeln!(out, "- Wind: no data in the forecast.")?,
            },
        }
    }
    writeln!(out)
}
